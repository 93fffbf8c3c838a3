//! View state handed to the render layer
//!
//! The visible time window and the set of plotted series are plain values.
//! Changing either produces a new `ViewState`; the pipeline itself never
//! reads them.

use crate::types::Span;
use serde::{Deserialize, Serialize};

/// Visible stretch of the time axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self { start: 0.0, end: 40.0 }
    }
}

impl TimeWindow {
    /// Window between two times, in either order
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Position of `time` across the window, 0.0 at `start` and 1.0 at `end`
    ///
    /// Times outside the window map outside `0.0..=1.0`. A zero-width window
    /// maps everything to 0.0.
    pub fn fraction(&self, time: f64) -> f64 {
        let width = self.width();
        if width == 0.0 {
            0.0
        } else {
            (time - self.start) / width
        }
    }

    /// Inverse of [`fraction`](Self::fraction)
    pub fn time_at(&self, fraction: f64) -> f64 {
        self.start + fraction * self.width()
    }

    /// Left edge and width of a span as fractions of the window
    ///
    /// An unterminated span is drawn up to the right edge of the window.
    pub fn span_extent(&self, span: &Span) -> (f64, f64) {
        let left = self.fraction(span.start_time);
        let right = match span.end_time {
            Some(end) => self.fraction(end),
            None => left.max(1.0),
        };
        (left, right - left)
    }

    /// Sub-window between two fractions of this one, e.g. a drag selection
    pub fn zoomed(&self, from: f64, to: f64) -> Self {
        Self::new(self.time_at(from), self.time_at(to))
    }
}

/// Everything the render layer needs besides the pipeline output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub window: TimeWindow,
    /// Series to plot, in the order they were added
    pub plotted: Vec<String>,
}

impl ViewState {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            plotted: Vec::new(),
        }
    }

    pub fn with_window(&self, window: TimeWindow) -> Self {
        Self {
            window,
            plotted: self.plotted.clone(),
        }
    }

    /// Add a series to the plot; adding one already plotted changes nothing
    pub fn with_series(&self, name: &str) -> Self {
        let mut next = self.clone();
        if !next.is_plotted(name) {
            next.plotted.push(name.to_string());
        }
        next
    }

    pub fn without_series(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.plotted.retain(|plotted| plotted != name);
        next
    }

    pub fn is_plotted(&self, name: &str) -> bool {
        self.plotted.iter().any(|plotted| plotted == name)
    }
}
