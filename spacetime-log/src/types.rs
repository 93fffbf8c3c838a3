//! Core types for the spacetime log library
//!
//! This module defines the records the ingester emits, the spans the tree
//! builder reconstructs from them, and the error type shared by every stage
//! of the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier carried by the lifecycle records of a span
pub type SpanId = i64;

/// Parent id reserved for top-level spans
pub const ROOT_PARENT_ID: SpanId = -1;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;

/// Where a malformed record was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLocation {
    /// 1-based line number in the raw input text
    Line(usize),
    /// 1-based position in the parsed record sequence
    Record(usize),
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordLocation::Line(n) => write!(f, "line {}", n),
            RecordLocation::Record(n) => write!(f, "record #{}", n),
        }
    }
}

/// Errors that can occur while reconstructing a timeline
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("Malformed record at {location}: {reason}")]
    MalformedRecord {
        location: RecordLocation,
        reason: String,
    },

    #[error("End record for span {id} at t={timestamp} has no open start")]
    DanglingReference { id: SpanId, timestamp: f64 },

    #[error("Span {id} references parent {parent_id}, which does not lead back to a root")]
    OrphanSpan { id: SpanId, parent_id: SpanId },

    #[error("Series has no value range (every value is {value})")]
    DegenerateSeries { value: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TimelineError {
    pub(crate) fn malformed(location: RecordLocation, reason: impl Into<String>) -> Self {
        TimelineError::MalformedRecord {
            location,
            reason: reason.into(),
        }
    }
}

/// A single named value attached to a log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: serde_json::Value,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One structured log line as emitted by the instrumented program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Time of the record, in the program's own units
    pub timestamp: f64,
    /// Free-form message; two sentinel values drive the span lifecycle
    pub message: String,
    /// Ordered fields; names are case-sensitive
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl LogRecord {
    pub fn new(timestamp: f64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Builder method: append a field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.push(Field::new(name, value));
        self
    }

    /// Value of the first field with exactly this name
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }
}

/// A named interval reconstructed from a start/end record pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: SpanId,
    /// Id of the enclosing span, or [`ROOT_PARENT_ID`]
    pub parent_id: SpanId,
    pub name: String,
    pub start_time: f64,
    /// `None` when no end record arrived in the batch
    pub end_time: Option<f64>,
    /// Nested spans, in the order their start records were seen
    pub children: Vec<Span>,
}

impl Span {
    pub fn new(id: SpanId, parent_id: SpanId, name: impl Into<String>, start_time: f64) -> Self {
        Self {
            id,
            parent_id,
            name: name.into(),
            start_time,
            end_time: None,
            children: Vec::new(),
        }
    }

    /// Builder method: set the end time
    pub fn ending_at(mut self, end_time: f64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Builder method: append a child span
    pub fn with_child(mut self, child: Span) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_PARENT_ID
    }

    pub fn is_terminated(&self) -> bool {
        self.end_time.is_some()
    }

    /// Length of the span, if it was terminated
    pub fn duration(&self) -> Option<f64> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// End of the span as used for overlap tests
    ///
    /// An unterminated span is still running, so it extends without bound.
    pub fn interval_end(&self) -> f64 {
        self.end_time.unwrap_or(f64::INFINITY)
    }

    /// Depth-first, pre-order walk over this span and all of its descendants
    pub fn walk(&self) -> impl Iterator<Item = &Span> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let span = stack.pop()?;
            stack.extend(span.children.iter().rev());
            Some(span)
        })
    }
}
