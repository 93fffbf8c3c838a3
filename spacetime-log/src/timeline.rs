//! Whole-batch pipeline
//!
//! [`Timeline`] runs every stage once over a complete batch: ingest the
//! text, rebuild the span trees, lay them out, and extract the telemetry
//! series. Rebuilding is cheap enough to redo from scratch whenever the
//! batch changes.

use crate::config::TimelineConfig;
use crate::ingest::{self, Ingested};
use crate::layout::{self, LevelMap};
use crate::series::{self, SeriesSet};
use crate::tree;
use crate::types::{LogRecord, Result, Span, SpanId, TimelineError};
use std::io::BufRead;

/// Spans, rows and series reconstructed from one batch of log text
#[derive(Debug)]
pub struct Timeline {
    records: Vec<LogRecord>,
    roots: Vec<Span>,
    levels: LevelMap,
    height: usize,
    series: SeriesSet,
    diagnostics: Vec<TimelineError>,
    dangling: Vec<TimelineError>,
}

impl Timeline {
    /// Build a timeline from newline-delimited JSON
    ///
    /// # Example
    /// ```
    /// use spacetime_log::{Timeline, TimelineConfig};
    ///
    /// let text = r#"{"timestamp": 0, "message": "Spacetime Start", "fields": [{"name": "ID", "value": 1}, {"name": "ParentID", "value": -1}, {"name": "EventName", "value": "match"}]}
    /// {"timestamp": 4, "message": "tick", "fields": [{"name": "data.battery", "value": 12.4}]}
    /// {"timestamp": 10, "message": "Spacetime End", "fields": [{"name": "ID", "value": 1}]}"#;
    ///
    /// let timeline = Timeline::from_text(text, &TimelineConfig::default()).unwrap();
    /// assert_eq!(timeline.roots()[0].end_time, Some(10.0));
    /// assert_eq!(timeline.level(1), Some(0));
    /// assert_eq!(timeline.series().discovered(), &["battery".to_string()]);
    /// ```
    pub fn from_text(text: &str, config: &TimelineConfig) -> Result<Self> {
        Self::from_ingested(ingest::ingest_str(text), config)
    }

    /// Build a timeline from a reader yielding newline-delimited JSON
    pub fn from_reader<R: BufRead>(reader: R, config: &TimelineConfig) -> Result<Self> {
        Self::from_ingested(ingest::ingest_reader(reader)?, config)
    }

    /// Build a timeline from records that were already parsed
    pub fn from_records(records: Vec<LogRecord>, config: &TimelineConfig) -> Result<Self> {
        Self::from_ingested(
            Ingested {
                records,
                diagnostics: Vec::new(),
            },
            config,
        )
    }

    fn from_ingested(ingested: Ingested, config: &TimelineConfig) -> Result<Self> {
        let Ingested {
            records,
            mut diagnostics,
        } = ingested;

        let forest = tree::build_span_tree(&records, config)?;
        diagnostics.extend(forest.diagnostics);

        let (levels, height) = layout::compute_levels(&forest.roots);
        let series = series::extract_series(&records, config);

        log::info!(
            "Timeline rebuilt: {} records, {} spans over {} rows, {} series, {} diagnostics, {} dangling ends",
            records.len(),
            levels.len(),
            height,
            series.len(),
            diagnostics.len(),
            forest.dangling.len()
        );

        Ok(Self {
            records,
            roots: forest.roots,
            levels,
            height,
            series,
            diagnostics,
            dangling: forest.dangling,
        })
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Top-level spans in start order
    pub fn roots(&self) -> &[Span] {
        &self.roots
    }

    /// Every span, depth-first
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.roots.iter().flat_map(|root| root.walk())
    }

    pub fn levels(&self) -> &LevelMap {
        &self.levels
    }

    /// Display row of a span
    ///
    /// When an id was reused, this is the row of the last span with it; use
    /// [`rows`](Self::rows) to tell them apart.
    pub fn level(&self, id: SpanId) -> Option<usize> {
        self.levels.get(id)
    }

    /// Every span with its display row, depth-first
    pub fn rows(&self) -> impl Iterator<Item = (&Span, usize)> {
        self.spans()
            .enumerate()
            .filter_map(move |(index, span)| self.levels.row_at(index).map(|row| (span, row)))
    }

    /// Rows occupied by the whole forest
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn series(&self) -> &SeriesSet {
        &self.series
    }

    /// Lines and lifecycle records that were dropped while rebuilding
    pub fn diagnostics(&self) -> &[TimelineError] {
        &self.diagnostics
    }

    /// End records that closed no open span
    pub fn dangling(&self) -> &[TimelineError] {
        &self.dangling
    }

    /// Earliest and latest time covered by spans and series points
    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        let span_times = self
            .spans()
            .flat_map(|span| std::iter::once(span.start_time).chain(span.end_time));
        let point_times = self
            .series
            .iter()
            .flat_map(|(_, series)| series.points.iter().map(|point| point.time));

        span_times.chain(point_times).fold(None, |bounds, t| match bounds {
            None => Some((t, t)),
            Some((lo, hi)) => Some((f64::min(lo, t), f64::max(hi, t))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BATCH: &str = r#"{"timestamp": 0, "message": "Spacetime Start", "fields": [{"name": "EventName", "value": "match"}, {"name": "ID", "value": 1}, {"name": "ParentID", "value": -1}]}
{"timestamp": 1, "message": "telemetry", "fields": [{"name": "data.cpu", "value": 0.5}]}
this line is not json
{"timestamp": 5, "message": "Spacetime Start", "fields": [{"name": "EventName", "value": "auto"}, {"name": "ID", "value": 2}, {"name": "ParentID", "value": 1}]}
{"timestamp": 8, "message": "Spacetime End", "fields": [{"name": "ID", "value": 2}, {"name": "data.cpu", "value": 0.9}]}
{"timestamp": 10, "message": "Spacetime End", "fields": [{"name": "ID", "value": 1}]}
"#;

    #[test]
    fn test_full_pipeline() {
        let timeline = Timeline::from_text(BATCH, &TimelineConfig::default()).unwrap();

        assert_eq!(timeline.records().len(), 5);
        assert_eq!(timeline.roots().len(), 1);
        assert_eq!(timeline.level(1), Some(0));
        assert_eq!(timeline.level(2), Some(1));
        assert_eq!(timeline.height(), 2);
        assert_eq!(timeline.series().get("cpu").unwrap().len(), 2);
        assert_eq!(timeline.diagnostics().len(), 1);
        assert_eq!(timeline.time_bounds(), Some((0.0, 10.0)));
    }

    #[test]
    fn test_reader_and_text_agree() {
        let config = TimelineConfig::default();
        let a = Timeline::from_text(BATCH, &config).unwrap();
        let b = Timeline::from_reader(Cursor::new(BATCH), &config).unwrap();
        assert_eq!(a.roots(), b.roots());
        assert_eq!(a.levels(), b.levels());
    }

    #[test]
    fn test_orphans_fail_the_build() {
        let text = r#"{"timestamp": 0, "message": "Spacetime Start", "fields": [{"name": "EventName", "value": "lost"}, {"name": "ID", "value": 2}, {"name": "ParentID", "value": 42}]}"#;
        let err = Timeline::from_text(text, &TimelineConfig::default()).unwrap_err();
        assert!(matches!(err, TimelineError::OrphanSpan { id: 2, parent_id: 42 }));
    }

    #[test]
    fn test_dangling_ends_are_reported() {
        let text = format!(
            "{}\n{}",
            BATCH, r#"{"timestamp": 11, "message": "Spacetime End", "fields": [{"name": "ID", "value": 99}]}"#
        );
        let timeline = Timeline::from_text(&text, &TimelineConfig::default()).unwrap();

        assert_eq!(timeline.roots().len(), 1);
        assert_eq!(timeline.height(), 2);
        assert_eq!(timeline.diagnostics().len(), 1);
        assert_eq!(timeline.dangling().len(), 1);
        assert!(matches!(
            timeline.dangling()[0],
            TimelineError::DanglingReference { id: 99, timestamp } if timestamp == 11.0
        ));
    }

    #[test]
    fn test_reused_id_rows() {
        let start = |t: f64, id: i64, name: &str| {
            format!(
                r#"{{"timestamp": {}, "message": "Spacetime Start", "fields": [{{"name": "EventName", "value": "{}"}}, {{"name": "ID", "value": {}}}, {{"name": "ParentID", "value": -1}}]}}"#,
                t, name, id
            )
        };
        let end = |t: f64, id: i64| {
            format!(r#"{{"timestamp": {}, "message": "Spacetime End", "fields": [{{"name": "ID", "value": {}}}]}}"#, t, id)
        };
        let text = [
            start(0.0, 1, "a"),
            start(1.0, 2, "b"),
            end(2.0, 1),
            start(2.5, 3, "c"),
            start(3.0, 1, "a again"),
            end(4.0, 1),
            end(5.0, 2),
            end(6.0, 3),
        ]
        .join("\n");
        let timeline = Timeline::from_text(&text, &TimelineConfig::default()).unwrap();

        let rows: Vec<(&str, usize)> = timeline.rows().map(|(span, row)| (span.name.as_str(), row)).collect();
        assert_eq!(rows, vec![("a", 0), ("b", 1), ("c", 0), ("a again", 2)]);
        assert_eq!(timeline.level(1), Some(2));
        assert_eq!(timeline.height(), 3);
    }

    #[test]
    fn test_empty_batch() {
        let timeline = Timeline::from_text("", &TimelineConfig::default()).unwrap();
        assert!(timeline.roots().is_empty());
        assert_eq!(timeline.height(), 0);
        assert!(timeline.series().is_empty());
        assert_eq!(timeline.time_bounds(), None);
    }
}
