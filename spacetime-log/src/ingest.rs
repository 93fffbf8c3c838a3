//! Record ingestion
//!
//! Turns newline-delimited JSON into [`LogRecord`]s. A line that does not
//! parse is dropped and reported; it never fails the batch.

use crate::types::{LogRecord, RecordLocation, Result, TimelineError};
use std::io::BufRead;

/// Records parsed from one batch, plus the lines that were dropped
#[derive(Debug, Default)]
pub struct Ingested {
    /// Records in original line order
    pub records: Vec<LogRecord>,
    /// One `MalformedRecord` per dropped line
    pub diagnostics: Vec<TimelineError>,
}

/// Parse a whole batch of log text
pub fn ingest_str(text: &str) -> Ingested {
    let mut ingested = Ingested::default();
    for (index, line) in text.lines().enumerate() {
        ingest_line(&mut ingested, index + 1, line);
    }
    log_summary(&ingested);
    ingested
}

/// Parse a batch from a reader, line by line
///
/// Read errors are fatal; parse errors are recovered like in [`ingest_str`].
pub fn ingest_reader<R: BufRead>(reader: R) -> Result<Ingested> {
    let mut ingested = Ingested::default();
    for (index, line) in reader.lines().enumerate() {
        ingest_line(&mut ingested, index + 1, &line?);
    }
    log_summary(&ingested);
    Ok(ingested)
}

fn ingest_line(ingested: &mut Ingested, line_number: usize, line: &str) {
    if line.trim().is_empty() {
        return;
    }

    match serde_json::from_str::<LogRecord>(line) {
        Ok(record) => ingested.records.push(record),
        Err(e) => {
            log::warn!("Dropping unparseable log line {}: {}", line_number, e);
            ingested
                .diagnostics
                .push(TimelineError::malformed(RecordLocation::Line(line_number), e.to_string()));
        }
    }
}

fn log_summary(ingested: &Ingested) {
    log::info!(
        "Ingested {} records ({} lines dropped)",
        ingested.records.len(),
        ingested.diagnostics.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BATCH: &str = r#"{"timestamp": 0, "message": "boot", "fields": []}
{"timestamp": 1, "message": "Spacetime Start", "fields": [{"name": "ID", "value": 1}]}
{"timestamp": 2, "message": "Spacetime End", "fields": [{"name": "ID", "value": 1}]}
"#;

    #[test]
    fn test_preserves_line_order() {
        let ingested = ingest_str(BATCH);
        assert!(ingested.diagnostics.is_empty());

        let messages: Vec<&str> = ingested.records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["boot", "Spacetime Start", "Spacetime End"]);
        assert_eq!(ingested.records[1].field("ID"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn test_malformed_lines_are_dropped() {
        let text = "{\"timestamp\": 0, \"message\": \"a\"}\n\
                    {not json\n\
                    {\"message\": \"missing timestamp\"}\n\
                    {\"timestamp\": 3, \"message\": \"d\"}";
        let ingested = ingest_str(text);

        assert_eq!(ingested.records.len(), 2);
        assert_eq!(ingested.records[1].message, "d");
        assert_eq!(ingested.diagnostics.len(), 2);

        let lines: Vec<RecordLocation> = ingested
            .diagnostics
            .iter()
            .map(|d| match d {
                TimelineError::MalformedRecord { location, .. } => *location,
                other => panic!("unexpected diagnostic: {}", other),
            })
            .collect();
        assert_eq!(lines, vec![RecordLocation::Line(2), RecordLocation::Line(3)]);
    }

    #[test]
    fn test_blank_lines_are_skipped_silently() {
        let ingested = ingest_str("\n   \n{\"timestamp\": 5, \"message\": \"x\"}\n\n");
        assert_eq!(ingested.records.len(), 1);
        assert!(ingested.diagnostics.is_empty());
    }

    #[test]
    fn test_reader_matches_str() {
        let from_reader = ingest_reader(Cursor::new(BATCH)).unwrap();
        let from_str = ingest_str(BATCH);
        assert_eq!(from_reader.records, from_str.records);
    }
}
