//! Core types for the CAN trace decoder library
//!
//! This module defines the canonical frame representation every format adapter
//! produces, the decoded observation the pipeline emits, and the error type for
//! run-fatal failures. Line- and frame-level problems are never errors here:
//! they are outcomes that the pipeline counts and moves past.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Decoded signal values keyed by signal name
pub type SignalMap = BTreeMap<String, f64>;

/// Classic CAN payloads never exceed this many bytes
pub const MAX_PAYLOAD_LEN: usize = 8;

/// Raw CAN frame recovered from one trace line
///
/// The timestamp is whatever the source format provides, in seconds. It is
/// monotonic within one trace but only a wall-clock time when the capture tool
/// wrote epoch seconds (candump usually does, ASC and CSV exports usually
/// don't, raw hex dumps substitute the line number).
#[derive(Debug, Clone, PartialEq)]
pub struct CanFrame {
    /// Timestamp in seconds
    pub timestamp: f64,
    /// CAN message ID
    pub can_id: u32,
    /// Frame data bytes (0-8 bytes)
    pub data: Vec<u8>,
}

impl CanFrame {
    pub fn new(timestamp: f64, can_id: u32, data: Vec<u8>) -> Self {
        Self {
            timestamp,
            can_id,
            data,
        }
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// Interpret the timestamp as seconds since the Unix epoch
    pub fn wall_clock(&self) -> Option<DateTime<Utc>> {
        wall_clock(self.timestamp)
    }
}

/// Interpret a trace timestamp as seconds since the Unix epoch
///
/// Returns `None` for negative or non-finite values.
pub fn wall_clock(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let secs = seconds.trunc() as i64;
    let nsecs = (seconds.fract() * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs, nsecs)
}

/// Result of running one raw line through a format adapter
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// The line carried an inbound data frame
    Frame(CanFrame),
    /// Blank, comment, header or otherwise non-data line
    Skip,
    /// The line matched the grammar partially and then failed a constraint
    Malformed(String),
}

impl LineOutcome {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        LineOutcome::Malformed(reason.into())
    }
}

/// A decoded subset of signals extracted from one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalObservation {
    /// Timestamp of the source frame in seconds
    pub timestamp: f64,
    /// Wanted signals present in the frame (never empty)
    pub signals: SignalMap,
}

impl SignalObservation {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.signals.get(name).copied()
    }
}

impl fmt::Display for SignalObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s:", self.timestamp)?;
        for (name, value) in &self.signals {
            write!(f, " {}={}", name, value)?;
        }
        Ok(())
    }
}

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Failed to load signal dictionary: {0}")]
    DictionaryLoad(String),

    #[error("Trace source not accessible: {0}")]
    SourceAccess(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wall_clock() {
        let frame = CanFrame::new(1_547_900_000.5, 0x292, vec![0; 8]);
        let ts = frame.wall_clock().unwrap();
        assert_eq!(ts.timestamp(), 1_547_900_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
        assert_eq!(frame.dlc(), 8);
    }

    #[test]
    fn test_wall_clock_rejects_negative() {
        assert!(wall_clock(-1.0).is_none());
        assert!(wall_clock(f64::NAN).is_none());
    }

    #[test]
    fn test_observation_display() {
        let mut signals = SignalMap::new();
        signals.insert("SOCave292".to_string(), 55.5);
        let obs = SignalObservation {
            timestamp: 1.5,
            signals,
        };
        assert_eq!(obs.to_string(), "1.500s: SOCave292=55.5");
        assert_eq!(obs.get("SOCave292"), Some(55.5));
        assert_eq!(obs.get("SOCmin292"), None);
    }
}
