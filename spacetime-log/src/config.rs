//! Pipeline configuration types
//!
//! This module defines the record vocabulary the pipeline recognizes: the
//! sentinel messages that open and close a span, the field names carried by
//! those records, and the marker that tags telemetry fields.

use serde::{Deserialize, Serialize};

/// Configuration for the whole pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Message of a record that opens a span
    #[serde(default = "default_start_message")]
    pub start_message: String,

    /// Message of a record that closes a span
    #[serde(default = "default_end_message")]
    pub end_message: String,

    /// Field holding the span identifier
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Field holding the parent span identifier (-1 for roots)
    #[serde(default = "default_parent_field")]
    pub parent_field: String,

    /// Field holding the span name
    #[serde(default = "default_name_field")]
    pub name_field: String,

    /// Prefix (matched case-insensitively) that tags a telemetry field
    #[serde(default = "default_series_marker")]
    pub series_marker: String,

    /// What to do with spans whose end record never arrived
    #[serde(default)]
    pub unterminated: UnterminatedPolicy,
}

fn default_start_message() -> String {
    "Spacetime Start".to_string()
}

fn default_end_message() -> String {
    "Spacetime End".to_string()
}

fn default_id_field() -> String {
    "ID".to_string()
}

fn default_parent_field() -> String {
    "ParentID".to_string()
}

fn default_name_field() -> String {
    "EventName".to_string()
}

fn default_series_marker() -> String {
    "data.".to_string()
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            start_message: default_start_message(),
            end_message: default_end_message(),
            id_field: default_id_field(),
            parent_field: default_parent_field(),
            name_field: default_name_field(),
            series_marker: default_series_marker(),
            unterminated: UnterminatedPolicy::default(),
        }
    }
}

/// Handling of spans that are still open when the batch ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnterminatedPolicy {
    /// Leave `end_time` unset; layout treats the span as running forever
    #[default]
    Open,
    /// Close the span at the last timestamp seen in the batch
    ClampToBatchEnd,
    /// Drop the span, and with it its whole subtree
    Exclude,
}

impl TimelineConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the span lifecycle sentinel messages
    pub fn with_lifecycle_messages(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_message = start.into();
        self.end_message = end.into();
        self
    }

    /// Builder method: set the names of the id, parent id and name fields
    pub fn with_span_fields(
        mut self,
        id: impl Into<String>,
        parent: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.id_field = id.into();
        self.parent_field = parent.into();
        self.name_field = name.into();
        self
    }

    /// Builder method: set the telemetry field marker
    pub fn with_series_marker(mut self, marker: impl Into<String>) -> Self {
        self.series_marker = marker.into();
        self
    }

    /// Builder method: set the unterminated span policy
    pub fn with_unterminated(mut self, policy: UnterminatedPolicy) -> Self {
        self.unterminated = policy;
        self
    }

    pub fn is_start(&self, message: &str) -> bool {
        message == self.start_message
    }

    pub fn is_end(&self, message: &str) -> bool {
        message == self.end_message
    }

    /// Series name carried by a telemetry field, if the field is one
    ///
    /// The marker is compared ASCII case-insensitively; the remainder keeps
    /// its case.
    pub fn series_name<'a>(&self, field_name: &'a str) -> Option<&'a str> {
        let marker_len = self.series_marker.len();
        let prefix = field_name.get(..marker_len)?;
        if prefix.eq_ignore_ascii_case(&self.series_marker) {
            field_name.get(marker_len..)
        } else {
            None
        }
    }
}
