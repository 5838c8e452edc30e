//! Message Decoding Engine
//!
//! Extracts signal values from raw payload bytes based on signal definitions
//! from the signal database. Handles bit extraction, endianness, multiplexing,
//! and physical value conversion.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::signals::dictionary::DecodeError;
use crate::types::SignalMap;

/// Message decoder - extracts signals from CAN payloads
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode all active signals of a message
    ///
    /// A payload shorter than the declared message size is rejected as a
    /// length mismatch; a longer one is accepted and the extra bytes ignored.
    /// For multiplexed messages only the signals selected by the multiplexor
    /// value are returned.
    pub fn decode_message(
        data: &[u8],
        message_def: &MessageDefinition,
    ) -> Result<SignalMap, DecodeError> {
        if data.len() < message_def.size {
            return Err(DecodeError::PayloadLengthMismatch {
                can_id: message_def.id,
                expected: message_def.size,
                actual: data.len(),
            });
        }

        // For multiplexed messages, first extract the multiplexer signal value
        let multiplexer_value = match &message_def.multiplexer_signal {
            Some(mux_name) => {
                let mux_signal = message_def
                    .signals
                    .iter()
                    .find(|s| &s.name == mux_name)
                    .ok_or_else(|| DecodeError::MalformedPayload {
                        can_id: message_def.id,
                        reason: format!("multiplexer '{}' not defined", mux_name),
                    })?;
                let raw = Self::extract_signal_value(data, mux_signal)
                    .map_err(|reason| malformed(message_def, reason))?;
                Some(raw as u64)
            }
            None => None,
        };

        let mut decoded = SignalMap::new();
        for signal in &message_def.signals {
            if let Some(ref mux_info) = signal.multiplexer_info {
                match multiplexer_value {
                    Some(value) if mux_info.multiplexer_values.contains(&value) => {}
                    _ => continue,
                }
            }

            let raw = Self::extract_signal_value(data, signal)
                .map_err(|reason| malformed(message_def, reason))?;
            decoded.insert(signal.name.clone(), signal.offset + signal.factor * raw as f64);
        }

        Ok(decoded)
    }

    /// Extract raw signal value from payload bytes
    ///
    /// Handles bit extraction with proper endianness support and sign
    /// extension. Fails when the signal reaches past the payload.
    fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Result<i64, String> {
        let start_bit = signal.start_bit as usize;
        let length = signal.length as usize;

        let raw_value = match signal.byte_order {
            ByteOrder::LittleEndian => Self::extract_little_endian(data, start_bit, length),
            ByteOrder::BigEndian => Self::extract_big_endian(data, start_bit, length),
        }
        .ok_or_else(|| {
            format!(
                "signal '{}' does not fit in {} byte(s)",
                signal.name,
                data.len()
            )
        })?;

        Ok(match signal.value_type {
            ValueType::Unsigned => raw_value as i64,
            ValueType::Signed => Self::sign_extend(raw_value, length),
        })
    }

    /// Extract signal with little-endian (Intel) byte order
    ///
    /// The start bit is the LSB; bits are numbered LSB-first within each byte,
    /// byte 0 first.
    fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
        if (start_bit + length + 7) / 8 > data.len() {
            return None;
        }

        let mut result: u64 = 0;
        for i in 0..length {
            let bit_pos = start_bit + i;
            let bit_value = (data[bit_pos / 8] >> (bit_pos % 8)) & 0x01;
            result |= (bit_value as u64) << i;
        }
        Some(result)
    }

    /// Extract signal with big-endian (Motorola) byte order
    ///
    /// The start bit is the MSB in DBC numbering (bit 7 of byte 0 is 7, bit 0
    /// of byte 1 is 8). Moving towards the LSB walks down within a byte and
    /// then continues at bit 7 of the next byte.
    fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
        let mut result: u64 = 0;
        let mut bit_pos = start_bit;

        for _ in 0..length {
            let byte = *data.get(bit_pos / 8)?;
            let bit_in_byte = bit_pos % 8;
            result = (result << 1) | ((byte >> bit_in_byte) & 0x01) as u64;

            bit_pos = if bit_in_byte == 0 {
                bit_pos + 15
            } else {
                bit_pos - 1
            };
        }
        Some(result)
    }

    /// Sign-extend a value from N bits to 64 bits
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}

fn malformed(message_def: &MessageDefinition, reason: String) -> DecodeError {
    DecodeError::MalformedPayload {
        can_id: message_def.id,
        reason,
    }
}
