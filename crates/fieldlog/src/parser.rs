//! Device export parser.
//!
//! Exports are tab-separated with a fixed 11-column layout. The first two rows
//! are a description line and a units line and are never looked at. Blank rows
//! in the body are tolerated. Any other row with the wrong width rejects the
//! whole file.

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use fieldlog_db::{DeviceMessage, MessageClass};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Number of columns in every data row.
pub const COLUMN_COUNT: usize = 11;

/// Leading rows discarded without inspection.
pub const HEADER_ROWS: usize = 2;

/// Headers plus at least one data row.
const MIN_ROWS: usize = HEADER_ROWS + 1;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file too short: {rows} rows, need at least 3")]
    TooShort { rows: usize },

    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("failed to read TSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Messages decoded from one export file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_name: String,
    /// Records seen including headers and skipped blank rows. Empty lines
    /// never become records.
    pub rows_read: usize,
    pub messages: Vec<DeviceMessage>,
}

/// Parse an export file from disk.
pub fn parse_tsv(path: &Path) -> Result<ParsedFile, ParseError> {
    let file = File::open(path).map_err(|source| ParseError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    parse_reader(&file_name, file)
}

/// Parse an export from any reader. The whole input is consumed so that a bad
/// row near the end still fails the file.
pub fn parse_reader<R: Read>(file_name: &str, reader: R) -> Result<ParsedFile, ParseError> {
    let mut iter = MessageIter::new(reader);
    let mut messages = Vec::new();
    for message in iter.by_ref() {
        messages.push(message?);
    }

    info!(
        file = file_name,
        rows = iter.rows_read(),
        messages = messages.len(),
        "Parsed export"
    );

    Ok(ParsedFile {
        file_name: file_name.to_string(),
        rows_read: iter.rows_read(),
        messages,
    })
}

/// Lazy record-by-record decoding of an export.
///
/// Yields at most one error, after which the iterator is exhausted. A short
/// file is reported when the input runs out.
pub struct MessageIter<R: Read> {
    records: StringRecordsIntoIter<R>,
    rows_read: usize,
    done: bool,
}

impl<R: Read> MessageIter<R> {
    pub fn new(reader: R) -> Self {
        let records = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(reader)
            .into_records();

        Self {
            records,
            rows_read: 0,
            done: false,
        }
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    fn fail(&mut self, err: ParseError) -> Option<Result<DeviceMessage, ParseError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<R: Read> Iterator for MessageIter<R> {
    type Item = Result<DeviceMessage, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => return self.fail(e.into()),
                None => {
                    if self.rows_read < MIN_ROWS {
                        return self.fail(ParseError::TooShort {
                            rows: self.rows_read,
                        });
                    }
                    self.done = true;
                    return None;
                }
            };
            self.rows_read += 1;

            if self.rows_read <= HEADER_ROWS {
                continue;
            }
            if is_blank(&record) {
                debug!(row = self.rows_read, "Skipping blank row");
                continue;
            }
            if record.len() != COLUMN_COUNT {
                let line = record
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(self.rows_read as u64);
                return self.fail(ParseError::ColumnCount {
                    line,
                    expected: COLUMN_COUNT,
                    found: record.len(),
                });
            }

            return Some(Ok(to_message(&record)));
        }
    }
}

/// Only a row with no content at all counts as blank. Whitespace is content.
fn is_blank(record: &StringRecord) -> bool {
    match record.len() {
        0 => true,
        1 => record[0].is_empty(),
        _ => false,
    }
}

fn to_message(record: &StringRecord) -> DeviceMessage {
    let text = |i: usize| record[i].trim().to_string();

    DeviceMessage {
        number: lenient_int(&record[0]),
        mqtt: text(1),
        invid: text(2),
        unit_guid: text(3),
        message_id: text(4),
        message_text: text(5),
        context: text(6),
        message_class: MessageClass::parse(&record[7]),
        level: lenient_int(&record[8]),
        area: text(9),
        address: text(10),
    }
}

/// Empty or malformed numbers become 0.
fn lenient_int(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Export of unit messages\t\t\t\t\t\t\t\t\t\t\nn\tmqtt\tinvid\tunit_guid\tmsg_id\ttext\tcontext\tclass\tlevel\tarea\taddr\n";

    fn row(cells: [&str; 11]) -> String {
        format!("{}\n", cells.join("\t"))
    }

    #[test]
    fn test_trims_fields_and_parses_numbers() {
        let input = format!(
            "{}{}",
            HEADER,
            row([" 7 ", " mqtt-1 ", "G-1", " guid-a ", "m1", "  boiler hot ", "ctx", " alarm ", "100", "HR", " 0x10 "])
        );
        let parsed = parse_reader("a.tsv", input.as_bytes()).unwrap();

        assert_eq!(parsed.rows_read, 3);
        assert_eq!(parsed.messages.len(), 1);
        let msg = &parsed.messages[0];
        assert_eq!(msg.number, 7);
        assert_eq!(msg.mqtt, "mqtt-1");
        assert_eq!(msg.unit_guid, "guid-a");
        assert_eq!(msg.message_text, "boiler hot");
        assert_eq!(msg.message_class, MessageClass::Alarm);
        assert_eq!(msg.level, 100);
        assert_eq!(msg.address, "0x10");
    }

    #[test]
    fn test_lenient_numbers_default_to_zero() {
        let input = format!(
            "{}{}",
            HEADER,
            row(["", "", "", "g", "", "", "", "info", "high", "", ""])
        );
        let parsed = parse_reader("a.tsv", input.as_bytes()).unwrap();
        assert_eq!(parsed.messages[0].number, 0);
        assert_eq!(parsed.messages[0].level, 0);
    }

    #[test]
    fn test_two_rows_is_too_short() {
        let err = parse_reader("a.tsv", HEADER.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::TooShort { rows: 2 }));
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_headers_are_not_checked() {
        let input = format!(
            "only one cell\nshort\theader\n{}",
            row(["1", "", "", "g", "", "", "", "", "", "", ""])
        );
        let parsed = parse_reader("a.tsv", input.as_bytes()).unwrap();
        assert_eq!(parsed.messages.len(), 1);
    }

    #[test]
    fn test_wrong_width_fails_whole_file() {
        let input = format!(
            "{}{}1\tonly\tthree\n",
            HEADER,
            row(["1", "", "", "g", "", "", "", "", "", "", ""])
        );
        let err = parse_reader("a.tsv", input.as_bytes()).unwrap_err();
        match err {
            ParseError::ColumnCount {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 4);
                assert_eq!(expected, COLUMN_COUNT);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_lines_are_skipped() {
        let input = format!(
            "{}{}\n\n{}",
            HEADER,
            row(["1", "", "", "g", "", "", "", "", "", "", ""]),
            row(["2", "", "", "g", "", "", "", "", "", "", ""])
        );
        let parsed = parse_reader("a.tsv", input.as_bytes()).unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.messages[1].number, 2);
    }

    #[test]
    fn test_whitespace_row_fails_whole_file() {
        let input = format!(
            "{}{}   \n{}",
            HEADER,
            row(["1", "", "", "g", "", "", "", "", "", "", ""]),
            row(["2", "", "", "g", "", "", "", "", "", "", ""])
        );
        let err = parse_reader("a.tsv", input.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::ColumnCount {
                line: 4,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_single_empty_cell_is_blank() {
        let mut record = StringRecord::new();
        record.push_field("");
        assert!(is_blank(&record));
        assert!(is_blank(&StringRecord::new()));

        let mut spaces = StringRecord::new();
        spaces.push_field("   ");
        assert!(!is_blank(&spaces));
    }

    #[test]
    fn test_quotes_are_literal() {
        let input = format!(
            "{}{}",
            HEADER,
            row(["1", "", "", "g", "", "\"valve \"A\" open", "", "", "", "", ""])
        );
        let parsed = parse_reader("a.tsv", input.as_bytes()).unwrap();
        assert_eq!(parsed.messages[0].message_text, "\"valve \"A\" open");
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let input = format!("{}1\t2\n{}", HEADER, row(["1", "", "", "g", "", "", "", "", "", "", ""]));
        let mut iter = MessageIter::new(input.as_bytes());
        assert!(matches!(iter.next(), Some(Err(ParseError::ColumnCount { .. }))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = parse_tsv(Path::new("/nonexistent/export.tsv")).unwrap_err();
        assert!(matches!(err, ParseError::Open { .. }));
    }
}
