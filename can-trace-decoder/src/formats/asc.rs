//! Vector ASC trace parser
//!
//! Parses classic CAN data lines from Vector ASCII logs:
//!
//! ```text
//! date Sat Jan 19 10:21:43 am 2019
//! base hex  timestamps absolute
//! internal events logged
//!    0.010070 1  154             Rx   d 8 00 32 10 00 00 00 E0 77
//! ```
//!
//! Fields: timestamp, channel, identifier (hex, `x` suffix for extended),
//! direction, frame type, DLC, then DLC data bytes. Only received (`Rx`) data
//! (`d`) frames are kept.

use super::{decode_payload, parse_identifier};
use crate::types::{CanFrame, LineOutcome, MAX_PAYLOAD_LEN};

/// Line prefixes of ASC header and block markers
const HEADER_PREFIXES: &[&str] = &["date", "base", "internal", "//", "Begin", "End"];

const DATA_OFFSET: usize = 6;

/// Parse one ASC line
pub fn parse_line(raw: &str) -> LineOutcome {
    let line = raw.trim();
    if line.is_empty()
        || HEADER_PREFIXES.iter().any(|p| line.starts_with(p))
        || line.contains("internal events")
        || line.contains("version")
    {
        return LineOutcome::Skip;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < DATA_OFFSET {
        return LineOutcome::Skip;
    }

    // Statistics, error frames and CAN FD lines don't have a numeric channel
    let Ok(timestamp) = fields[0].parse::<f64>() else {
        return LineOutcome::Skip;
    };
    if !timestamp.is_finite() || fields[1].parse::<u32>().is_err() {
        return LineOutcome::Skip;
    }

    if fields[3] != "Rx" || fields[4] != "d" {
        return LineOutcome::Skip;
    }

    let id_token = fields[2].trim_end_matches(['x', 'X']);
    let can_id = match parse_identifier(id_token) {
        Ok(id) => id,
        Err(reason) => return LineOutcome::Malformed(reason),
    };

    let dlc = match fields[5].parse::<usize>() {
        Ok(dlc) if dlc <= MAX_PAYLOAD_LEN => dlc,
        _ => return LineOutcome::malformed(format!("invalid DLC '{}'", fields[5])),
    };

    let byte_fields = &fields[DATA_OFFSET..];
    if byte_fields.len() < dlc {
        return LineOutcome::malformed(format!(
            "DLC {} but only {} data fields",
            dlc,
            byte_fields.len()
        ));
    }

    let byte_fields = &byte_fields[..dlc];
    if let Some(field) = byte_fields.iter().find(|f| f.len() != 2) {
        return LineOutcome::malformed(format!("byte field '{}' is not two hex digits", field));
    }

    match decode_payload(&byte_fields.concat()) {
        Ok(data) => LineOutcome::Frame(CanFrame::new(timestamp, can_id, data)),
        Err(reason) => LineOutcome::Malformed(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rx_data_frame() {
        let outcome = parse_line("   0.010070 1  154             Rx   d 8 00 32 10 00 00 00 E0 77");
        assert_eq!(
            outcome,
            LineOutcome::Frame(CanFrame::new(
                0.01007,
                0x154,
                vec![0x00, 0x32, 0x10, 0x00, 0x00, 0x00, 0xE0, 0x77]
            ))
        );
    }

    #[test]
    fn test_tx_frame_discarded() {
        assert_eq!(
            parse_line("0.010070 1  292             Tx   d 8 0A 1E 28 64 00 00 00 FF"),
            LineOutcome::Skip
        );
    }

    #[test]
    fn test_remote_frame_discarded() {
        assert_eq!(parse_line("0.5 1 292 Rx r 8"), LineOutcome::Skip);
    }

    #[test]
    fn test_headers_skipped() {
        assert_eq!(parse_line("date Sat Jan 19 10:21:43 am 2019"), LineOutcome::Skip);
        assert_eq!(parse_line("base hex  timestamps absolute"), LineOutcome::Skip);
        assert_eq!(parse_line("internal events logged"), LineOutcome::Skip);
        assert_eq!(parse_line("// version 9.0.0"), LineOutcome::Skip);
        assert_eq!(parse_line("Begin Triggerblock Sat Jan 19 10:21:43 am 2019"), LineOutcome::Skip);
        assert_eq!(parse_line("   0.000000 Start of measurement"), LineOutcome::Skip);
        assert_eq!(parse_line("   1.234000 1  ErrorFrame"), LineOutcome::Skip);
    }

    #[test]
    fn test_extended_identifier() {
        match parse_line("2.5 1 18FEF100x Rx d 2 01 02") {
            LineOutcome::Frame(frame) => {
                assert_eq!(frame.can_id, 0x18FEF100);
                assert_eq!(frame.data, vec![0x01, 0x02]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        // DLC says 8, only 7 bytes present
        assert!(matches!(
            parse_line("0.5 1 292 Rx d 8 0A 1E 28 64 00 00 00"),
            LineOutcome::Malformed(_)
        ));
        // Three-digit byte field throws the count off
        assert!(matches!(
            parse_line("0.5 1 292 Rx d 2 0A 1E2"),
            LineOutcome::Malformed(_)
        ));
        assert!(matches!(
            parse_line("0.5 1 292 Rx d 2 0A 1"),
            LineOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_byte_fields_must_be_two_digits() {
        // Concatenated these would read as a valid two-byte payload
        assert_eq!(
            parse_line("0.5 1 292 Rx d 2 0 0A1"),
            LineOutcome::Malformed("byte field '0' is not two hex digits".to_string())
        );
        // Fields past the DLC are not inspected
        match parse_line("0.5 1 292 Rx d 1 0A 1 Length = 0") {
            LineOutcome::Frame(frame) => assert_eq!(frame.data, vec![0x0A]),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_bad_hex_is_malformed() {
        assert!(matches!(
            parse_line("0.5 1 292 Rx d 2 0A ZZ"),
            LineOutcome::Malformed(_)
        ));
        assert!(matches!(
            parse_line("0.5 1 2Q2 Rx d 2 0A 1E"),
            LineOutcome::Malformed(_)
        ));
        assert!(matches!(
            parse_line("0.5 1 292 Rx d 9 00 00 00 00 00 00 00 00 00"),
            LineOutcome::Malformed(_)
        ));
    }
}
