//! Track packing and level assignment
//!
//! Siblings that overlap in time cannot share a display row. Each sibling
//! group is packed first-fit into tracks, in input order, and tracks are
//! stacked one below the other; a span's children start on the row just
//! below it.
//!
//! First-fit in input order is not an optimal interval coloring. It is kept
//! because the row a span lands on then depends only on the spans before it,
//! which keeps rows stable across rebuilds.

use crate::types::{Span, SpanId};
use std::collections::HashMap;

/// Spans sharing one vertical lane within a sibling group
pub type Track<'a> = Vec<&'a Span>;

/// Display row of every span in a layout pass
///
/// Rows are kept per span, by the span's depth-first position in the laid
/// out forest (the order of [`Span::walk`] over each root in turn), and per
/// id. Ids may be reused once a span closes; [`get`](Self::get) then
/// answers for the last such span depth-first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelMap {
    rows: HashMap<SpanId, (usize, usize)>,
    walk: HashMap<usize, usize>,
}

impl LevelMap {
    /// Row of the span with this id
    pub fn get(&self, id: SpanId) -> Option<usize> {
        self.rows.get(&id).map(|&(_, row)| row)
    }

    /// Row of the span at this depth-first position
    pub fn row_at(&self, index: usize) -> Option<usize> {
        self.walk.get(&index).copied()
    }

    /// Number of spans laid out
    pub fn len(&self) -> usize {
        self.walk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walk.is_empty()
    }

    /// Row per distinct id
    pub fn iter(&self) -> impl Iterator<Item = (SpanId, usize)> + '_ {
        self.rows.iter().map(|(&id, &(_, row))| (id, row))
    }

    fn insert(&mut self, index: usize, id: SpanId, row: usize) {
        self.walk.insert(index, row);
        let entry = self.rows.entry(id).or_insert((index, row));
        if index >= entry.0 {
            *entry = (index, row);
        }
    }

    fn merge(&mut self, other: LevelMap) {
        for (index, row) in other.walk {
            self.walk.insert(index, row);
        }
        for (id, (index, row)) in other.rows {
            let entry = self.rows.entry(id).or_insert((index, row));
            if index >= entry.0 {
                *entry = (index, row);
            }
        }
    }
}

/// Whether two spans share any stretch of time
///
/// Open intervals: a span ending exactly when another starts does not
/// overlap it. Unterminated spans extend to infinity.
pub fn overlaps(a: &Span, b: &Span) -> bool {
    a.start_time < b.interval_end() && a.interval_end() > b.start_time
}

/// Pack one sibling group into tracks
///
/// Every span goes into the first track, in creation order, that holds
/// nothing overlapping it; a new track is opened when none qualifies.
/// Within a track spans keep their sibling order.
pub fn pack_tracks(group: &[Span]) -> Vec<Track<'_>> {
    pack_positions(group)
        .into_iter()
        .map(|track| track.into_iter().map(|position| &group[position]).collect())
        .collect()
}

/// First-fit packing by position within the group
fn pack_positions(group: &[Span]) -> Vec<Vec<usize>> {
    let mut tracks: Vec<Vec<usize>> = Vec::new();

    for (position, span) in group.iter().enumerate() {
        let free = tracks
            .iter()
            .position(|track| !track.iter().any(|&member| overlaps(span, &group[member])));

        match free {
            Some(index) => {
                log::trace!("Span {} placed on track {}", span.id, index);
                tracks[index].push(position);
            }
            None => {
                log::trace!("Span {} opens track {}", span.id, tracks.len());
                tracks.push(vec![position]);
            }
        }
    }

    tracks
}

/// Assign rows to a sibling group and all of its descendants
///
/// Returns the rows and the number of rows the group occupies starting at
/// `base`. Tracks are stacked in order; each track is as tall as its tallest
/// span, and a span is one row plus the height of its children. Depth-first
/// positions count from the group's first span.
pub fn assign_group(group: &[Span], base: usize) -> (LevelMap, usize) {
    assign_from(group, base, 0)
}

fn assign_from(group: &[Span], base: usize, first_index: usize) -> (LevelMap, usize) {
    // Depth-first position of each sibling: everything before it in the
    // group, subtrees included, comes first.
    let mut offsets = Vec::with_capacity(group.len());
    let mut next = first_index;
    for span in group {
        offsets.push(next);
        next += span.walk().count();
    }

    let mut levels = LevelMap::default();
    let mut height = 0;

    for track in pack_positions(group) {
        let row = base + height;
        let mut track_height = 0;

        for position in track {
            let span = &group[position];
            let index = offsets[position];
            levels.insert(index, span.id, row);
            let (child_levels, child_height) = assign_from(&span.children, row + 1, index + 1);
            levels.merge(child_levels);
            track_height = track_height.max(1 + child_height);
        }

        height += track_height;
    }

    (levels, height)
}

/// Assign rows to a whole forest, starting at row 0
pub fn compute_levels(roots: &[Span]) -> (LevelMap, usize) {
    let (levels, height) = assign_group(roots, 0);
    log::debug!("Laid out {} spans over {} rows", levels.len(), height);
    (levels, height)
}
