//! Dictionary traits
//!
//! A dictionary maps a CAN identifier to a message descriptor, and a
//! descriptor turns payload bytes into named physical values. Both steps can
//! fail without the failure being fatal to a run.

use crate::types::SignalMap;

/// Per-frame decode failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Message not found: CAN ID 0x{0:X}")]
    UnknownIdentifier(u32),

    #[error("Payload length mismatch for 0x{can_id:X}: expected {expected} bytes, got {actual}")]
    PayloadLengthMismatch {
        can_id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Malformed payload for 0x{can_id:X}: {reason}")]
    MalformedPayload { can_id: u32, reason: String },
}

/// One message layout
pub trait MessageDescriptor {
    /// Message name from the dictionary
    fn name(&self) -> &str;

    /// Decode every signal of this message from the payload
    fn decode(&self, payload: &[u8]) -> Result<SignalMap, DecodeError>;
}

/// Read-only lookup from identifier to message layout
pub trait SignalDictionary {
    type Message: MessageDescriptor;

    /// Find the message layout for an identifier
    fn lookup(&self, can_id: u32) -> Result<&Self::Message, DecodeError>;

    /// Look up and decode in one step
    fn decode(&self, can_id: u32, payload: &[u8]) -> Result<SignalMap, DecodeError> {
        self.lookup(can_id)?.decode(payload)
    }
}

impl<D: SignalDictionary + ?Sized> SignalDictionary for &D {
    type Message = D::Message;

    fn lookup(&self, can_id: u32) -> Result<&Self::Message, DecodeError> {
        (**self).lookup(can_id)
    }
}
