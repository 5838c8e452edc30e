//! Pipeline configuration types
//!
//! This module defines the minimal configuration a pipeline run needs: which
//! trace grammar to apply, which decoded signals to keep, and which signal
//! triple (if any) to check for max >= avg >= min consistency.

use crate::types::{DecoderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default first cell of the header row in CSV exports
pub const DEFAULT_CSV_HEADER_MARKER: &str = "Message Number";

/// Source trace encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceFormat {
    /// `(1547900000.123) can0 292#0A1E2864000000FF`
    CandumpLog,
    /// Vector ASCII trace
    Asc,
    /// Bus analyzer CSV export with `Time (ms)`, `ID` and `Data (Hex)` columns
    Csv,
    /// One `<id><payload>` hex string per line, no timestamps
    RawHex,
}

impl TraceFormat {
    /// Guess the format from a file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match extension.as_deref() {
            Some("log") => Some(TraceFormat::CandumpLog),
            Some("asc") => Some(TraceFormat::Asc),
            Some("csv") => Some(TraceFormat::Csv),
            Some("txt") | Some("hex") => Some(TraceFormat::RawHex),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TraceFormat::CandumpLog => "candump_log",
            TraceFormat::Asc => "asc",
            TraceFormat::Csv => "csv",
            TraceFormat::RawHex => "raw_hex",
        }
    }
}

impl fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceFormat {
    type Err = DecoderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "candump_log" | "candump" | "log" => Ok(TraceFormat::CandumpLog),
            "asc" => Ok(TraceFormat::Asc),
            "csv" => Ok(TraceFormat::Csv),
            "raw_hex" | "hex" | "txt" => Ok(TraceFormat::RawHex),
            other => Err(DecoderError::InvalidConfig(format!(
                "Unknown trace format: {}",
                other
            ))),
        }
    }
}

/// Three signals expected to satisfy max >= avg >= min at every joint sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyTriple {
    pub max: String,
    pub avg: String,
    pub min: String,
}

impl ConsistencyTriple {
    pub fn new(max: impl Into<String>, avg: impl Into<String>, min: impl Into<String>) -> Self {
        Self {
            max: max.into(),
            avg: avg.into(),
            min: min.into(),
        }
    }

    pub fn names(&self) -> [&str; 3] {
        [&self.max, &self.avg, &self.min]
    }
}

impl FromStr for ConsistencyTriple {
    type Err = DecoderError;

    /// Parse `MAX,AVG,MIN`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [max, avg, min] if !max.is_empty() && !avg.is_empty() && !min.is_empty() => {
                Ok(Self::new(*max, *avg, *min))
            }
            _ => Err(DecoderError::InvalidConfig(format!(
                "Consistency triple must be MAX,AVG,MIN, got '{}'",
                s
            ))),
        }
    }
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Grammar used to read the trace
    pub format: TraceFormat,

    /// Decoded signals to retain
    #[serde(default)]
    pub signal_names: BTreeSet<String>,

    /// Optional max/avg/min consistency check
    #[serde(default)]
    pub consistency_triple: Option<ConsistencyTriple>,

    /// First cell of the CSV header row
    #[serde(default = "default_csv_header_marker")]
    pub csv_header_marker: String,

    /// Fixed identifier width (3 or 4 hex digits) for raw hex traces.
    /// `None` tries 3 digits, then 4.
    #[serde(default)]
    pub raw_hex_id_digits: Option<usize>,
}

fn default_csv_header_marker() -> String {
    DEFAULT_CSV_HEADER_MARKER.to_string()
}

impl PipelineConfig {
    /// Create a configuration for the given format with no signals selected
    pub fn new(format: TraceFormat) -> Self {
        Self {
            format,
            signal_names: BTreeSet::new(),
            consistency_triple: None,
            csv_header_marker: default_csv_header_marker(),
            raw_hex_id_digits: None,
        }
    }

    /// Builder method: replace the retained signal set
    pub fn with_signals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signal_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method: retain one more signal
    pub fn add_signal(mut self, name: impl Into<String>) -> Self {
        self.signal_names.insert(name.into());
        self
    }

    /// Builder method: enable the consistency check
    pub fn with_consistency_triple(mut self, triple: ConsistencyTriple) -> Self {
        self.consistency_triple = Some(triple);
        self
    }

    /// Builder method: override the CSV header marker
    pub fn with_csv_header_marker(mut self, marker: impl Into<String>) -> Self {
        self.csv_header_marker = marker.into();
        self
    }

    /// Builder method: pin the raw hex identifier width instead of guessing
    pub fn with_raw_hex_id_digits(mut self, digits: usize) -> Self {
        self.raw_hex_id_digits = Some(digits);
        self
    }

    /// Reject configurations that could never produce an observation
    pub fn validate(&self) -> Result<()> {
        if self.signal_names.is_empty() {
            return Err(DecoderError::InvalidConfig(
                "No signal names selected".to_string(),
            ));
        }
        if self.format == TraceFormat::Csv && self.csv_header_marker.trim().is_empty() {
            return Err(DecoderError::InvalidConfig(
                "CSV header marker must not be empty".to_string(),
            ));
        }
        if let Some(digits) = self.raw_hex_id_digits {
            if digits != 3 && digits != 4 {
                return Err(DecoderError::InvalidConfig(format!(
                    "Raw hex identifier width must be 3 or 4 digits, got {}",
                    digits
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_builder() {
        let config = PipelineConfig::new(TraceFormat::Asc)
            .with_signals(["SOCave292", "SOCmax292"])
            .add_signal("SOCmin292")
            .with_consistency_triple(ConsistencyTriple::new("SOCmax292", "SOCave292", "SOCmin292"));

        assert_eq!(config.format, TraceFormat::Asc);
        assert_eq!(config.signal_names.len(), 3);
        assert!(config.signal_names.contains("SOCmin292"));
        assert!(!config.signal_names.contains("BMS_maxRegenPower"));
        assert!(config.consistency_triple.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_signal_set_rejected() {
        let config = PipelineConfig::new(TraceFormat::Csv);
        assert!(matches!(
            config.validate(),
            Err(DecoderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_raw_hex_width_validation() {
        let config = PipelineConfig::new(TraceFormat::RawHex)
            .add_signal("SOCave292")
            .with_raw_hex_id_digits(5);
        assert!(config.validate().is_err());
        assert!(config.with_raw_hex_id_digits(4).validate().is_ok());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            TraceFormat::from_extension(Path::new("run.LOG")),
            Some(TraceFormat::CandumpLog)
        );
        assert_eq!(
            TraceFormat::from_extension(Path::new("supercharge.asc")),
            Some(TraceFormat::Asc)
        );
        assert_eq!(
            TraceFormat::from_extension(Path::new("model3_big.txt")),
            Some(TraceFormat::RawHex)
        );
        assert_eq!(TraceFormat::from_extension(Path::new("trace.blf")), None);
    }

    #[test]
    fn test_triple_parsing() {
        let triple: ConsistencyTriple = "SOCmax292, SOCave292,SOCmin292".parse().unwrap();
        assert_eq!(triple.names(), ["SOCmax292", "SOCave292", "SOCmin292"]);
        assert!("a,b".parse::<ConsistencyTriple>().is_err());
        assert!("a,,c".parse::<ConsistencyTriple>().is_err());
    }

    #[test]
    fn test_format_serde_names() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"format":"raw_hex","signal_names":["X"]}"#).unwrap();
        assert_eq!(config.format, TraceFormat::RawHex);
        assert_eq!(config.csv_header_marker, DEFAULT_CSV_HEADER_MARKER);
    }
}
