//! Raw hex text parser
//!
//! Each line is a bare hex string: identifier digits immediately followed by
//! the payload, e.g. `2920A1E2864000000FF`. There is no timestamp, so the
//! 1-based line number stands in for one.
//!
//! # Identifier width
//!
//! The identifier width is not recorded in the file. By default the parser
//! tries a 3-digit identifier first and falls back to 4 digits when the
//! remainder is not a valid payload (even length, at most 8 bytes). This is a
//! guess: with the usual 11-bit identifiers it amounts to "odd line length
//! means 3 digits", and a 4-digit identifier followed by an odd number of
//! payload digits would be misread. Callers that know the width should pin it
//! with [`RawHexParser::with_id_digits`].

use super::{decode_payload, parse_identifier};
use crate::types::{CanFrame, LineOutcome};

/// Shortest line that can hold a 3-digit identifier and a payload byte pair
const MIN_LINE_LEN: usize = 6;

/// Stateful raw hex adapter (tracks the line number)
#[derive(Debug, Clone, Default)]
pub struct RawHexParser {
    line_number: u64,
    id_digits: Option<usize>,
}

impl RawHexParser {
    /// Guess the identifier width per line
    pub fn new() -> Self {
        Self::default()
    }

    /// Always read `digits` identifier digits
    pub fn with_id_digits(digits: usize) -> Self {
        Self {
            line_number: 0,
            id_digits: Some(digits),
        }
    }

    /// Number of lines seen so far
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Parse one raw hex line
    pub fn parse_line(&mut self, raw: &str) -> LineOutcome {
        self.line_number += 1;

        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.len() < MIN_LINE_LEN {
            return LineOutcome::Skip;
        }
        if !line.bytes().all(|b| b.is_ascii_hexdigit()) {
            return LineOutcome::malformed(format!("non-hex characters in '{}'", line));
        }

        let widths: &[usize] = match &self.id_digits {
            Some(digits) => std::slice::from_ref(digits),
            None => &[3, 4],
        };

        let mut last_reason = String::new();
        for &width in widths {
            match split_frame(line, width) {
                Ok((can_id, data)) => {
                    return LineOutcome::Frame(CanFrame::new(
                        self.line_number as f64,
                        can_id,
                        data,
                    ));
                }
                Err(reason) => last_reason = reason,
            }
        }

        LineOutcome::Malformed(last_reason)
    }
}

fn split_frame(line: &str, width: usize) -> std::result::Result<(u32, Vec<u8>), String> {
    // At least as many payload digits as identifier digits
    if line.len() < width * 2 {
        return Err(format!("line too short for a {}-digit identifier", width));
    }
    let (id_str, data_str) = line.split_at(width);
    let can_id = parse_identifier(id_str)?;
    let data = decode_payload(data_str)?;
    Ok((can_id, data))
}
