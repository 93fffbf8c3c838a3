//! Telemetry series extraction
//!
//! Every field whose name starts with the configured marker contributes one
//! point, at the record's timestamp, to the series named by the rest of the
//! field name.

use crate::config::TimelineConfig;
use crate::types::{LogRecord, Result, TimelineError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single telemetry sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub time: f64,
    pub value: f64,
}

/// Points of one series, in record-arrival order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Copy of the points ordered by time (stable for equal times)
    pub fn sorted_by_time(&self) -> Vec<SeriesPoint> {
        let mut points = self.points.clone();
        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        points
    }

    /// Smallest and largest value, or `None` for an empty series
    pub fn value_range(&self) -> Option<ValueRange> {
        let first = self.points.first()?.value;
        let (min, max) = self
            .points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(p.value), max.max(p.value)));
        Some(ValueRange { min, max })
    }
}

/// Value extent of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// True when every value in the series is the same
    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    /// Position of `value` within the range, 0.0 at `min` and 1.0 at `max`
    ///
    /// A degenerate range has no extent to divide by and yields
    /// `DegenerateSeries`.
    pub fn fraction(&self, value: f64) -> Result<f64> {
        if self.is_degenerate() {
            return Err(TimelineError::DegenerateSeries { value: self.min });
        }
        Ok((value - self.min) / (self.max - self.min))
    }

    /// Like [`fraction`](Self::fraction), but places a flat series mid-range
    pub fn fraction_or_mid(&self, value: f64) -> f64 {
        self.fraction(value).unwrap_or(0.5)
    }
}

/// All series found in one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSet {
    series: HashMap<String, Series>,
    /// Series names in the order they were first seen
    discovered: Vec<String>,
    /// Telemetry fields whose value was not numeric
    skipped: usize,
}

impl SeriesSet {
    pub fn get(&self, name: &str) -> Option<&Series> {
        self.series.get(name)
    }

    /// Series names, each reported once, in first-discovery order
    pub fn discovered(&self) -> &[String] {
        &self.discovered
    }

    /// `(name, series)` pairs in first-discovery order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.discovered
            .iter()
            .filter_map(|name| self.series.get(name).map(|s| (name.as_str(), s)))
    }

    pub fn len(&self) -> usize {
        self.discovered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty()
    }

    /// Number of telemetry fields dropped for having a non-numeric value
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn push(&mut self, name: &str, point: SeriesPoint) {
        match self.series.get_mut(name) {
            Some(series) => series.points.push(point),
            None => {
                log::debug!("Discovered data series '{}'", name);
                self.discovered.push(name.to_string());
                self.series.insert(name.to_string(), Series { points: vec![point] });
            }
        }
    }
}

/// Collect every telemetry series in the records
pub fn extract_series(records: &[LogRecord], config: &TimelineConfig) -> SeriesSet {
    let mut set = SeriesSet::default();

    for record in records {
        for field in &record.fields {
            let Some(name) = config.series_name(&field.name) else {
                continue;
            };

            match numeric_value(&field.value) {
                Some(value) => set.push(
                    name,
                    SeriesPoint {
                        time: record.timestamp,
                        value,
                    },
                ),
                None => {
                    log::warn!(
                        "Ignoring non-numeric value {} for series '{}' at t={}",
                        field.value,
                        name,
                        record.timestamp
                    );
                    set.skipped += 1;
                }
            }
        }
    }

    log::info!("Extracted {} data series", set.len());
    set
}

/// Convert a field value to a sample, if it has a numeric reading
fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
