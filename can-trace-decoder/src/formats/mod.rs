//! Trace format adapters (candump log, Vector ASC, CSV export, raw hex)
//!
//! Each adapter turns one raw text line into a [`LineOutcome`]: a frame, a
//! silent skip, or a countable malformed line. The four grammars form a closed
//! set, so [`LineParser`] dispatches on a tagged union instead of a trait
//! object. The CSV and raw hex adapters carry a little per-run state (header
//! columns, line counter); the other two are pure functions of the line.

use crate::config::{PipelineConfig, TraceFormat};
use crate::types::{DecoderError, LineOutcome, Result, MAX_PAYLOAD_LEN};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub mod asc;
pub mod candump;
pub mod csv_export;
pub mod raw_hex;

pub use csv_export::CsvParser;
pub use raw_hex::RawHexParser;

/// Line adapter for one trace format
#[derive(Debug, Clone)]
pub enum LineParser {
    CandumpLog,
    Asc,
    Csv(CsvParser),
    RawHex(RawHexParser),
}

impl LineParser {
    /// Build the adapter selected by the configuration
    pub fn new(config: &PipelineConfig) -> Self {
        match config.format {
            TraceFormat::CandumpLog => LineParser::CandumpLog,
            TraceFormat::Asc => LineParser::Asc,
            TraceFormat::Csv => LineParser::Csv(CsvParser::new(&config.csv_header_marker)),
            TraceFormat::RawHex => match config.raw_hex_id_digits {
                Some(digits) => LineParser::RawHex(RawHexParser::with_id_digits(digits)),
                None => LineParser::RawHex(RawHexParser::new()),
            },
        }
    }

    /// Build the adapter for a format with default settings
    pub fn for_format(format: TraceFormat) -> Self {
        Self::new(&PipelineConfig::new(format))
    }

    pub fn format(&self) -> TraceFormat {
        match self {
            LineParser::CandumpLog => TraceFormat::CandumpLog,
            LineParser::Asc => TraceFormat::Asc,
            LineParser::Csv(_) => TraceFormat::Csv,
            LineParser::RawHex(_) => TraceFormat::RawHex,
        }
    }

    /// Parse one raw line
    pub fn parse_line(&mut self, raw: &str) -> LineOutcome {
        match self {
            LineParser::CandumpLog => candump::parse_line(raw),
            LineParser::Asc => asc::parse_line(raw),
            LineParser::Csv(parser) => parser.parse_line(raw),
            LineParser::RawHex(parser) => parser.parse_line(raw),
        }
    }

    /// Called once the source is exhausted
    pub fn finish(&self) {
        if let LineParser::Csv(parser) = self {
            if !parser.header_found() {
                log::warn!(
                    "CSV header row starting with '{}' was never found; no rows were read",
                    parser.marker()
                );
            }
        }
    }
}

/// Decode a payload hex string into at most eight bytes
///
/// Odd length, more than 16 hex digits, or non-hex characters are rejected
/// with a short reason suitable for a malformed-line diagnostic.
pub(crate) fn decode_payload(hex_str: &str) -> std::result::Result<Vec<u8>, String> {
    if hex_str.len() % 2 != 0 {
        return Err(format!("odd-length payload '{}'", hex_str));
    }
    if hex_str.len() > MAX_PAYLOAD_LEN * 2 {
        return Err(format!(
            "payload of {} bytes exceeds {} bytes",
            hex_str.len() / 2,
            MAX_PAYLOAD_LEN
        ));
    }
    hex::decode(hex_str).map_err(|e| format!("invalid payload hex '{}': {}", hex_str, e))
}

/// Parse a hexadecimal identifier, with or without a `0x` prefix
pub(crate) fn parse_identifier(token: &str) -> std::result::Result<u32, String> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() {
        return Err("empty identifier".to_string());
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("invalid identifier '{}'", token));
    }
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid identifier '{}': {}", token, e))
}

/// Open a trace file as a line source
///
/// Fails with [`DecoderError::SourceAccess`] before producing any line when the
/// file is missing or cannot be opened.
pub fn open_trace(path: &Path) -> Result<TraceLines<BufReader<File>>> {
    log::info!("Opening trace file: {:?}", path);

    if !path.exists() {
        return Err(DecoderError::SourceAccess(format!(
            "Trace file not found: {:?}",
            path
        )));
    }

    let file = File::open(path).map_err(|e| {
        DecoderError::SourceAccess(format!("Failed to open trace file {:?}: {}", path, e))
    })?;

    Ok(TraceLines::new(BufReader::new(file)))
}

/// Iterator over the text lines of a trace source
///
/// Lines are decoded as UTF-8, falling back to Latin-1 for exports written by
/// Windows tools. A read error is yielded once and ends the iteration.
pub struct TraceLines<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> TraceLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for TraceLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n') | Some(b'\r')) {
                    self.buf.pop();
                }
                let line = match std::str::from_utf8(&self.buf) {
                    Ok(s) => s.to_string(),
                    Err(_) => self.buf.iter().map(|&b| b as char).collect(),
                };
                Some(Ok(line))
            }
            Err(e) => {
                self.done = true;
                Some(Err(DecoderError::SourceAccess(format!(
                    "Failed to read trace: {}",
                    e
                ))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload("0A1E").unwrap(), vec![0x0A, 0x1E]);
        assert_eq!(decode_payload("").unwrap(), Vec::<u8>::new());
        assert!(decode_payload("0A1").is_err());
        assert!(decode_payload("0A1E2864000000FF00").is_err());
        assert!(decode_payload("ZZ").is_err());
    }

    #[test]
    fn test_parse_identifier() {
        assert_eq!(parse_identifier("0x292").unwrap(), 0x292);
        assert_eq!(parse_identifier("292").unwrap(), 0x292);
        assert!(parse_identifier("0x").is_err());
        assert!(parse_identifier("G12").is_err());
        assert!(parse_identifier("+12").is_err());
    }

    #[test]
    fn test_trace_lines_strip_endings_and_fallback() {
        let data: &[u8] = b"first\r\nsecond\ncaf\xe9\n";
        let lines: Vec<String> = TraceLines::new(Cursor::new(data))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["first", "second", "caf\u{e9}"]);
    }

    #[test]
    fn test_open_missing_trace() {
        let result = open_trace(Path::new("nonexistent.asc"));
        assert!(matches!(result, Err(DecoderError::SourceAccess(_))));
    }

    #[test]
    fn test_dispatch_by_format() {
        let config = PipelineConfig::new(TraceFormat::RawHex).with_raw_hex_id_digits(4);
        let mut parser = LineParser::new(&config);
        assert_eq!(parser.format(), TraceFormat::RawHex);
        match parser.parse_line("02920A1E") {
            LineOutcome::Frame(frame) => assert_eq!(frame.can_id, 0x292),
            other => panic!("unexpected outcome: {:?}", other),
        }

        let mut parser = LineParser::for_format(TraceFormat::CandumpLog);
        assert_eq!(parser.parse_line(""), LineOutcome::Skip);
    }
}
