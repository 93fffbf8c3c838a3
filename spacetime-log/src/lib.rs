//! Spacetime Log Library
//!
//! A stateless library that rebuilds a timeline from the structured log of an
//! instrumented program: nested timing spans laid out into display rows, and
//! the numeric telemetry series recorded alongside them.
//!
//! # Architecture
//!
//! Each batch of log text goes through one synchronous pass:
//! - Parses newline-delimited JSON records, dropping lines that fail to parse
//! - Matches "start"/"end" records by span id into a tree of spans
//! - Packs overlapping siblings into tracks and assigns every span a row
//! - Collects every `data.`-tagged field into a named time/value series
//!
//! The library does NOT:
//! - Fetch or watch log files
//! - Draw anything or handle input
//! - Update a timeline incrementally; it is rebuilt per batch
//!
//! # Example Usage
//!
//! ```no_run
//! use spacetime_log::{Timeline, TimelineConfig, TimeWindow};
//!
//! let text = std::fs::read_to_string("match.log").unwrap();
//! let timeline = Timeline::from_text(&text, &TimelineConfig::default()).unwrap();
//!
//! let window = TimeWindow::new(0.0, 40.0);
//! for (span, row) in timeline.rows() {
//!     let (left, width) = window.span_extent(span);
//!     println!("{:>3} {:<20} left={:.2} width={:.2}", row, span.name, left, width);
//! }
//!
//! for name in timeline.series().discovered() {
//!     println!("series: {}", name);
//! }
//! ```

// Public modules
pub mod config;
pub mod ingest;
pub mod layout;
pub mod series;
pub mod timeline;
pub mod tree;
pub mod types;
pub mod view;

// Re-export main types for convenience
pub use config::{TimelineConfig, UnterminatedPolicy};
pub use ingest::{ingest_reader, ingest_str, Ingested};
pub use layout::{assign_group, compute_levels, overlaps, pack_tracks, LevelMap, Track};
pub use series::{extract_series, Series, SeriesPoint, SeriesSet, ValueRange};
pub use timeline::Timeline;
pub use tree::{build_span_tree, SpanForest, SpanTreeBuilder};
pub use types::{
    Field, LogRecord, RecordLocation, Result, Span, SpanId, TimelineError, ROOT_PARENT_ID,
};
pub use view::{TimeWindow, ViewState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
