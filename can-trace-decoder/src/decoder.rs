//! Signal decoder adapter
//!
//! Turns an accepted frame into an observation of the wanted signals. Frames
//! the dictionary does not know, frames it cannot decode, and frames carrying
//! none of the wanted signals all yield no observation; traces routinely carry
//! far more traffic than the signal set of interest.

use crate::signals::{DecodeError, SignalDictionary};
use crate::types::{CanFrame, SignalMap, SignalObservation};
use std::collections::BTreeSet;

/// What became of one accepted frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// At least one wanted signal was decoded
    Observation(SignalObservation),
    /// The dictionary has no entry for the identifier
    UnknownIdentifier(u32),
    /// The dictionary entry could not interpret the payload
    DecodeFailed(DecodeError),
    /// Decoded fine, but none of the signals are wanted
    FilteredOut,
}

impl FrameOutcome {
    pub fn into_observation(self) -> Option<SignalObservation> {
        match self {
            FrameOutcome::Observation(observation) => Some(observation),
            _ => None,
        }
    }
}

/// Decode a frame and classify the result
pub fn classify_frame<D>(
    dictionary: &D,
    frame: &CanFrame,
    wanted_names: &BTreeSet<String>,
) -> FrameOutcome
where
    D: SignalDictionary + ?Sized,
{
    let decoded = match dictionary.decode(frame.can_id, &frame.data) {
        Ok(decoded) => decoded,
        Err(DecodeError::UnknownIdentifier(can_id)) => {
            log::trace!("Unknown CAN ID: 0x{:X}, dropping frame", can_id);
            return FrameOutcome::UnknownIdentifier(can_id);
        }
        Err(e) => {
            log::trace!("Dropping frame at {:.6}s: {}", frame.timestamp, e);
            return FrameOutcome::DecodeFailed(e);
        }
    };

    let signals: SignalMap = decoded
        .into_iter()
        .filter(|(name, _)| wanted_names.contains(name))
        .collect();

    if signals.is_empty() {
        return FrameOutcome::FilteredOut;
    }

    FrameOutcome::Observation(SignalObservation {
        timestamp: frame.timestamp,
        signals,
    })
}

/// Decode a frame into an observation of the wanted signals, if any
pub fn decode_observation<D>(
    dictionary: &D,
    frame: &CanFrame,
    wanted_names: &BTreeSet<String>,
) -> Option<SignalObservation>
where
    D: SignalDictionary + ?Sized,
{
    classify_frame(dictionary, frame, wanted_names).into_observation()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::MessageDescriptor;
    use std::collections::HashMap;

    /// Stub dictionary: every known ID decodes byte 0 and byte 1 as two signals
    struct StubMessage {
        size: usize,
    }

    impl MessageDescriptor for StubMessage {
        fn name(&self) -> &str {
            "Stub"
        }

        fn decode(&self, payload: &[u8]) -> Result<SignalMap, DecodeError> {
            if payload.len() < self.size {
                return Err(DecodeError::PayloadLengthMismatch {
                    can_id: 0,
                    expected: self.size,
                    actual: payload.len(),
                });
            }
            let mut map = SignalMap::new();
            map.insert("A".to_string(), payload[0] as f64);
            map.insert("B".to_string(), payload[1] as f64);
            Ok(map)
        }
    }

    struct StubDictionary(HashMap<u32, StubMessage>);

    impl SignalDictionary for StubDictionary {
        type Message = StubMessage;

        fn lookup(&self, can_id: u32) -> Result<&StubMessage, DecodeError> {
            self.0.get(&can_id).ok_or(DecodeError::UnknownIdentifier(can_id))
        }
    }

    fn dictionary() -> StubDictionary {
        StubDictionary(HashMap::from([(0x100, StubMessage { size: 2 })]))
    }

    fn wanted(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_observation_keeps_only_wanted() {
        let frame = CanFrame::new(2.0, 0x100, vec![7, 9]);
        let obs = decode_observation(&dictionary(), &frame, &wanted(&["B", "C"])).unwrap();
        assert_eq!(obs.timestamp, 2.0);
        assert_eq!(obs.signals.len(), 1);
        assert_eq!(obs.get("B"), Some(9.0));
    }

    #[test]
    fn test_unknown_identifier_dropped() {
        let frame = CanFrame::new(2.0, 0x200, vec![7, 9]);
        assert_eq!(
            classify_frame(&dictionary(), &frame, &wanted(&["A"])),
            FrameOutcome::UnknownIdentifier(0x200)
        );
        assert!(decode_observation(&dictionary(), &frame, &wanted(&["A"])).is_none());
    }

    #[test]
    fn test_decode_failure_dropped() {
        let frame = CanFrame::new(2.0, 0x100, vec![7]);
        assert!(matches!(
            classify_frame(&dictionary(), &frame, &wanted(&["A"])),
            FrameOutcome::DecodeFailed(DecodeError::PayloadLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_intersection_dropped() {
        let frame = CanFrame::new(2.0, 0x100, vec![7, 9]);
        assert_eq!(
            classify_frame(&dictionary(), &frame, &wanted(&["Z"])),
            FrameOutcome::FilteredOut
        );
    }
}
