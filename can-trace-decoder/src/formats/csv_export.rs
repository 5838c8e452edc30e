//! CSV export parser
//!
//! Bus analyzer CSV exports start with a free-form preamble, followed by a
//! quoted header row and one row per frame:
//!
//! ```text
//! "Message Number","Time (ms)","Time Delta (ms)","Bus","Type","ID","Data (Hex)"
//! "1","1500","0","0","Standard","0x292","0A 1E 28 64 00 00 00 FF"
//! ```
//!
//! Lines are skipped until a row whose first cell equals the header marker.
//! From then on rows are read by column name, so column order does not matter.

use super::{decode_payload, parse_identifier};
use crate::types::{CanFrame, LineOutcome};
use csv::{ReaderBuilder, StringRecord};

pub const TIME_COLUMN: &str = "Time (ms)";
pub const ID_COLUMN: &str = "ID";
pub const DATA_COLUMN: &str = "Data (Hex)";

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    time: Option<usize>,
    id: usize,
    data: usize,
}

impl Columns {
    fn from_header(record: &StringRecord) -> Option<Self> {
        let position = |name: &str| record.iter().position(|cell| cell.trim() == name);
        Some(Self {
            time: position(TIME_COLUMN),
            id: position(ID_COLUMN)?,
            data: position(DATA_COLUMN)?,
        })
    }
}

/// Stateful CSV row adapter
#[derive(Debug, Clone)]
pub struct CsvParser {
    marker: String,
    columns: Option<Columns>,
}

impl CsvParser {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.trim().trim_matches('"').to_string(),
            columns: None,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// True once the header row has been located
    pub fn header_found(&self) -> bool {
        self.columns.is_some()
    }

    /// Parse one CSV line
    pub fn parse_line(&mut self, raw: &str) -> LineOutcome {
        if raw.trim().is_empty() {
            return LineOutcome::Skip;
        }

        let Some(record) = read_record(raw) else {
            return match self.columns {
                Some(_) => LineOutcome::malformed("unparseable CSV row"),
                None => LineOutcome::Skip,
            };
        };

        let Some(columns) = self.columns else {
            self.try_header(&record);
            return LineOutcome::Skip;
        };

        let cell = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

        let id_str = cell(columns.id);
        let data_str = cell(columns.data);
        if id_str.is_empty() || data_str.is_empty() {
            return LineOutcome::Skip;
        }

        // A missing time column reads as zero
        let timestamp = match columns.time {
            Some(idx) => match cell(idx).parse::<f64>() {
                Ok(ms) if ms.is_finite() => ms / 1000.0,
                _ => return LineOutcome::malformed(format!("invalid time '{}'", cell(idx))),
            },
            None => 0.0,
        };

        let can_id = match parse_identifier(id_str) {
            Ok(id) => id,
            Err(reason) => return LineOutcome::Malformed(reason),
        };

        let data_hex: String = data_str.chars().filter(|c| *c != ' ').collect();
        match decode_payload(&data_hex) {
            Ok(data) => LineOutcome::Frame(CanFrame::new(timestamp, can_id, data)),
            Err(reason) => LineOutcome::Malformed(reason),
        }
    }

    fn try_header(&mut self, record: &StringRecord) {
        if record.get(0).map(str::trim) != Some(self.marker.as_str()) {
            return;
        }
        match Columns::from_header(record) {
            Some(columns) => {
                log::debug!("CSV header located: {:?}", columns);
                self.columns = Some(columns);
            }
            None => log::warn!(
                "CSV header row lacks '{}' or '{}' column, still searching",
                ID_COLUMN,
                DATA_COLUMN
            ),
        }
    }
}

fn read_record(line: &str) -> Option<StringRecord> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    reader.records().next().and_then(|r| r.ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        r#""Message Number","Time (ms)","Time Delta (ms)","Bus","Type","ID","Data (Hex)""#;

    fn parser_with_header() -> CsvParser {
        let mut parser = CsvParser::new("Message Number");
        assert_eq!(parser.parse_line(HEADER), LineOutcome::Skip);
        assert!(parser.header_found());
        parser
    }

    #[test]
    fn test_preamble_skipped_until_header() {
        let mut parser = CsvParser::new("Message Number");
        assert_eq!(parser.parse_line("Exported by bus analyzer"), LineOutcome::Skip);
        assert_eq!(parser.parse_line(r#""1","1500","0","0","Standard","0x292","0A""#), LineOutcome::Skip);
        assert!(!parser.header_found());
        assert_eq!(parser.parse_line(HEADER), LineOutcome::Skip);
        assert!(parser.header_found());
    }

    #[test]
    fn test_parse_row() {
        let mut parser = parser_with_header();
        let outcome =
            parser.parse_line(r#""1","1500","0","0","Standard","0x292","0A 1E 28 64 00 00 00 FF""#);
        assert_eq!(
            outcome,
            LineOutcome::Frame(CanFrame::new(
                1.5,
                0x292,
                vec![0x0A, 0x1E, 0x28, 0x64, 0x00, 0x00, 0x00, 0xFF]
            ))
        );
    }

    #[test]
    fn test_id_without_prefix() {
        let mut parser = parser_with_header();
        match parser.parse_line(r#""2","250","0","0","Standard","264","0102""#) {
            LineOutcome::Frame(frame) => {
                assert_eq!(frame.can_id, 0x264);
                assert_eq!(frame.timestamp, 0.25);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_empty_cells_skipped() {
        let mut parser = parser_with_header();
        assert_eq!(
            parser.parse_line(r#""3","300","0","0","Standard","","""#),
            LineOutcome::Skip
        );
        assert_eq!(parser.parse_line(r#""4","300""#), LineOutcome::Skip);
    }

    #[test]
    fn test_malformed_rows() {
        let mut parser = parser_with_header();
        assert!(matches!(
            parser.parse_line(r#""5","abc","0","0","Standard","0x292","0A""#),
            LineOutcome::Malformed(_)
        ));
        assert!(matches!(
            parser.parse_line(r#""6","1","0","0","Standard","0x292","0A 1""#),
            LineOutcome::Malformed(_)
        ));
        assert!(matches!(
            parser.parse_line(r#""7","1","0","0","Standard","0xZZ","0A""#),
            LineOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_reordered_columns() {
        let mut parser = CsvParser::new("\"Message Number\"");
        parser.parse_line("Message Number,ID,Data (Hex),Time (ms)");
        match parser.parse_line("1,0x292,0A1E,2000") {
            LineOutcome::Frame(frame) => {
                assert_eq!(frame.timestamp, 2.0);
                assert_eq!(frame.data, vec![0x0A, 0x1E]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
