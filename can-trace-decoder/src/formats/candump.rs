//! candump log parser
//!
//! Parses the `candump -l` log layout produced by Linux can-utils:
//!
//! ```text
//! (1547900000.123456) can0 292#0A1E2864000000FF
//! ```
//!
//! Every line is an inbound frame; there is no direction marker. Remote
//! frames (`123#R`) are not data frames and are skipped.

use super::{decode_payload, parse_identifier};
use crate::types::{CanFrame, LineOutcome};

/// Parse one candump log line
pub fn parse_line(raw: &str) -> LineOutcome {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return LineOutcome::Skip;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [timestamp_token, _interface, message] = tokens.as_slice() else {
        return LineOutcome::Skip;
    };

    // Anything not shaped like "(ts) iface ID#DATA" is not a frame line
    if !timestamp_token.starts_with('(') || !timestamp_token.ends_with(')') {
        return LineOutcome::Skip;
    }
    let Some((id_str, data_str)) = message.split_once('#') else {
        return LineOutcome::Skip;
    };

    let timestamp = match timestamp_token
        .trim_start_matches('(')
        .trim_end_matches(')')
        .parse::<f64>()
    {
        Ok(ts) if ts.is_finite() => ts,
        _ => {
            return LineOutcome::malformed(format!("invalid timestamp '{}'", timestamp_token));
        }
    };

    let can_id = match parse_identifier(id_str) {
        Ok(id) => id,
        Err(reason) => return LineOutcome::Malformed(reason),
    };

    if data_str.starts_with('R') {
        return LineOutcome::Skip;
    }

    match decode_payload(data_str) {
        Ok(data) => LineOutcome::Frame(CanFrame::new(timestamp, can_id, data)),
        Err(reason) => LineOutcome::Malformed(reason),
    }
}
