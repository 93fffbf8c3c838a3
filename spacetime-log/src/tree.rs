//! Span tree reconstruction
//!
//! Start and end records are matched by span id. Spans live in an arena in
//! the order their start records arrived. Parent ids are resolved only once
//! the whole batch is consumed, against every span the batch started, so a
//! parent may start after its children. The arena is then folded into owned
//! trees and the id tables are dropped.

use crate::config::{TimelineConfig, UnterminatedPolicy};
use crate::types::{LogRecord, RecordLocation, Result, Span, SpanId, TimelineError, ROOT_PARENT_ID};
use std::collections::HashMap;

/// Root spans of one batch, plus the lifecycle records that were skipped
#[derive(Debug, Default)]
pub struct SpanForest {
    /// Top-level spans in the order their start records were seen
    pub roots: Vec<Span>,
    /// One `MalformedRecord` per skipped lifecycle record
    pub diagnostics: Vec<TimelineError>,
    /// One `DanglingReference` per end record that closed no open span
    pub dangling: Vec<TimelineError>,
}

impl SpanForest {
    /// Every span of every tree, depth-first
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.roots.iter().flat_map(|root| root.walk())
    }
}

/// Incremental matcher of start/end records
///
/// Feed records in arrival order with [`push`](Self::push), then call
/// [`finish`](Self::finish) once to link and freeze the trees.
pub struct SpanTreeBuilder<'a> {
    config: &'a TimelineConfig,
    /// Spans in first-start order; children are attached in `finish`
    arena: Vec<Span>,
    /// Currently open span ids
    open: HashMap<SpanId, usize>,
    /// Every slot started under each id, in start order
    starts: HashMap<SpanId, Vec<usize>>,
    batch_end: Option<f64>,
    position: usize,
    diagnostics: Vec<TimelineError>,
    dangling: Vec<TimelineError>,
}

impl<'a> SpanTreeBuilder<'a> {
    pub fn new(config: &'a TimelineConfig) -> Self {
        Self {
            config,
            arena: Vec::new(),
            open: HashMap::new(),
            starts: HashMap::new(),
            batch_end: None,
            position: 0,
            diagnostics: Vec::new(),
            dangling: Vec::new(),
        }
    }

    /// Consume the next record of the batch
    ///
    /// Lifecycle records missing a required field are skipped and kept as
    /// diagnostics. An end record that closes nothing is reported as
    /// dangling. Reusing an open id is a hard error.
    pub fn push(&mut self, record: &LogRecord) -> Result<()> {
        self.position += 1;
        self.batch_end = Some(match self.batch_end {
            Some(end) => end.max(record.timestamp),
            None => record.timestamp,
        });

        if self.config.is_start(&record.message) {
            self.start(record)
        } else if self.config.is_end(&record.message) {
            self.end(record);
            Ok(())
        } else {
            Ok(())
        }
    }

    fn start(&mut self, record: &LogRecord) -> Result<()> {
        let (id, parent_id, name) = match self.start_fields(record) {
            Ok(fields) => fields,
            Err(e) => {
                self.recover(e);
                return Ok(());
            }
        };

        if self.open.contains_key(&id) {
            return Err(TimelineError::malformed(
                self.location(),
                format!("span id {} started again while still open", id),
            ));
        }
        if self.starts.contains_key(&id) {
            log::warn!("Span id {} reused at t={} after it was closed", id, record.timestamp);
        }

        let slot = self.arena.len();
        log::debug!("Span {} '{}' started at t={} (parent {})", id, name, record.timestamp, parent_id);
        self.arena.push(Span::new(id, parent_id, name, record.timestamp));
        self.open.insert(id, slot);
        self.starts.entry(id).or_default().push(slot);
        Ok(())
    }

    fn end(&mut self, record: &LogRecord) {
        let id = match self.integer_field(record, &self.config.id_field) {
            Ok(id) => id,
            Err(e) => {
                self.recover(e);
                return;
            }
        };

        let Some(slot) = self.open.remove(&id) else {
            let error = TimelineError::DanglingReference {
                id,
                timestamp: record.timestamp,
            };
            log::error!("{}", error);
            self.dangling.push(error);
            return;
        };

        let span = &mut self.arena[slot];
        if record.timestamp < span.start_time {
            log::warn!(
                "Span {} ends at t={} before it started at t={}",
                id,
                record.timestamp,
                span.start_time
            );
        }
        span.end_time = Some(record.timestamp);
        log::debug!("Span {} ended at t={}", id, record.timestamp);
    }

    /// Slot of the span a child names as its parent
    ///
    /// With a reused id, the latest span with that id started before the
    /// child wins; failing that, the latest one in the batch.
    fn parent_slot(&self, child: usize) -> Option<usize> {
        let candidates = self.starts.get(&self.arena[child].parent_id)?;
        candidates
            .iter()
            .rev()
            .find(|&&slot| slot < child)
            .or_else(|| candidates.last())
            .copied()
    }

    /// Link the arena into trees and freeze them
    ///
    /// Fails with `OrphanSpan` when a parent id names no span in the batch,
    /// or when spans cannot be reached from any root (a span naming itself
    /// or a parent cycle).
    pub fn finish(self) -> Result<SpanForest> {
        let total = self.arena.len();
        let mut parents: Vec<Option<usize>> = Vec::with_capacity(total);
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); total];
        let mut root_slots = Vec::new();

        for slot in 0..total {
            let span = &self.arena[slot];
            if span.parent_id == ROOT_PARENT_ID {
                parents.push(None);
                root_slots.push(slot);
                continue;
            }
            let parent = self.parent_slot(slot).ok_or(TimelineError::OrphanSpan {
                id: span.id,
                parent_id: span.parent_id,
            })?;
            parents.push(Some(parent));
            children[parent].push(slot);
        }

        // Pre-order walk from the roots; anything left unvisited hangs off a cycle
        let mut order = Vec::with_capacity(total);
        let mut visited = vec![false; total];
        let mut stack: Vec<usize> = root_slots.iter().rev().copied().collect();
        while let Some(slot) = stack.pop() {
            visited[slot] = true;
            order.push(slot);
            stack.extend(children[slot].iter().rev());
        }
        if let Some(slot) = visited.iter().position(|seen| !seen) {
            let span = &self.arena[slot];
            return Err(TimelineError::OrphanSpan {
                id: span.id,
                parent_id: span.parent_id,
            });
        }

        let batch_end = self.batch_end.unwrap_or(0.0);
        let policy = self.config.unterminated;
        let mut slots: Vec<Option<Span>> = self.arena.into_iter().map(Some).collect();
        let mut roots = Vec::new();
        let mut excluded = 0;

        // Reverse pre-order completes every subtree before its parent is
        // visited, and meets siblings last-first.
        for &slot in order.iter().rev() {
            let Some(mut span) = slots[slot].take() else {
                continue;
            };
            span.children.reverse();

            if span.end_time.is_none() {
                match policy {
                    UnterminatedPolicy::Open => {
                        log::debug!("Span {} '{}' has no end record", span.id, span.name);
                    }
                    UnterminatedPolicy::ClampToBatchEnd => {
                        log::debug!("Clamping span {} '{}' to t={}", span.id, span.name, batch_end);
                        span.end_time = Some(batch_end);
                    }
                    UnterminatedPolicy::Exclude => {
                        let dropped = span.walk().count();
                        log::warn!(
                            "Excluding unterminated span {} '{}' ({} spans dropped)",
                            span.id,
                            span.name,
                            dropped
                        );
                        excluded += dropped;
                        continue;
                    }
                }
            }

            match parents[slot] {
                Some(parent) => {
                    if let Some(parent_span) = slots[parent].as_mut() {
                        parent_span.children.push(span);
                    }
                }
                None => roots.push(span),
            }
        }
        roots.reverse();

        log::info!(
            "Built {} root spans from {} spans ({} excluded, {} records skipped, {} dangling ends)",
            roots.len(),
            total,
            excluded,
            self.diagnostics.len(),
            self.dangling.len()
        );

        Ok(SpanForest {
            roots,
            diagnostics: self.diagnostics,
            dangling: self.dangling,
        })
    }

    fn start_fields(&self, record: &LogRecord) -> Result<(SpanId, SpanId, String)> {
        let id = self.integer_field(record, &self.config.id_field)?;
        let parent_id = self.integer_field(record, &self.config.parent_field)?;
        let name = match record.field(&self.config.name_field) {
            Some(serde_json::Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(TimelineError::malformed(
                    self.location(),
                    format!("field '{}' must be a string, got {}", self.config.name_field, other),
                ))
            }
            None => return Err(self.missing(&self.config.name_field)),
        };
        Ok((id, parent_id, name))
    }

    fn integer_field(&self, record: &LogRecord, name: &str) -> Result<SpanId> {
        let value = record.field(name).ok_or_else(|| self.missing(name))?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
            .ok_or_else(|| {
                TimelineError::malformed(
                    self.location(),
                    format!("field '{}' must be an integer, got {}", name, value),
                )
            })
    }

    fn missing(&self, name: &str) -> TimelineError {
        TimelineError::malformed(self.location(), format!("missing field '{}'", name))
    }

    fn location(&self) -> RecordLocation {
        RecordLocation::Record(self.position)
    }

    fn recover(&mut self, error: TimelineError) {
        log::warn!("Skipping lifecycle record: {}", error);
        self.diagnostics.push(error);
    }
}

/// Build the span trees for a complete batch of records
pub fn build_span_tree(records: &[LogRecord], config: &TimelineConfig) -> Result<SpanForest> {
    let mut builder = SpanTreeBuilder::new(config);
    for record in records {
        builder.push(record)?;
    }
    builder.finish()
}
