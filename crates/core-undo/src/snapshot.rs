//! Tag snapshot capture and restore.
//!
//! A capture over `[start, end)` lists, for every tag touching the range, the
//! exact sub-ranges it covers. Clearing all tags over the range and applying
//! the capture reproduces the original formatting, including tags that span
//! the whole range without an internal toggle.

use core_document::{Document, TagId, TagToggle};
use std::collections::BTreeMap;
use std::ops::Range;

/// `tag` was applied (`applied == true`) or must be removed over `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSnapshot {
    pub tag: TagId,
    pub start: usize,
    pub end: usize,
    pub applied: bool,
}

impl TagSnapshot {
    pub fn new(tag: TagId, range: Range<usize>, applied: bool) -> Self {
        Self {
            tag,
            start: range.start,
            end: range.end,
            applied,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub(crate) fn shifted(self, by: usize) -> Self {
        Self {
            start: self.start + by,
            end: self.end + by,
            ..self
        }
    }
}

/// Pure capture over a toggle stream.
///
/// `seed` is the set of tags covering `range.start`; `toggles` must be ordered
/// by offset. Only boundaries strictly inside the range are consulted. Output
/// order is closure order; callers treat it as a set.
pub fn capture_from_toggles<I>(seed: I, toggles: &[TagToggle], range: Range<usize>) -> Vec<TagSnapshot>
where
    I: IntoIterator<Item = TagId>,
{
    if range.start >= range.end {
        return Vec::new();
    }
    let mut open: BTreeMap<TagId, usize> = seed.into_iter().map(|t| (t, range.start)).collect();
    let mut out = Vec::new();

    let inside: Vec<&TagToggle> = toggles
        .iter()
        .filter(|t| t.offset > range.start && t.offset < range.end)
        .collect();
    for boundary in inside.chunk_by(|a, b| a.offset == b.offset) {
        for toggle in boundary.iter().filter(|t| !t.opening) {
            if let Some(since) = open.remove(&toggle.tag) {
                out.push(TagSnapshot::new(toggle.tag, since..toggle.offset, true));
            }
        }
        for toggle in boundary.iter().filter(|t| t.opening) {
            open.entry(toggle.tag).or_insert(toggle.offset);
        }
    }

    // Synthetic closing toggle at the range end.
    for (tag, since) in open {
        out.push(TagSnapshot::new(tag, since..range.end, true));
    }
    out
}

/// Capture the tag coverage of `range` in `doc`. Read-only.
pub fn capture<D: Document + ?Sized>(doc: &D, range: Range<usize>) -> Vec<TagSnapshot> {
    if range.start >= range.end {
        return Vec::new();
    }
    let seed = doc.tags_at(range.start);
    let toggles = doc.tag_toggle_points(range.clone());
    capture_from_toggles(seed, &toggles, range)
}

/// Apply a snapshot list in two passes: every removal, then every application.
/// The result does not depend on the order entries were recorded in.
pub fn apply_snapshots<D: Document + ?Sized>(doc: &mut D, snapshots: &[TagSnapshot]) {
    for s in snapshots.iter().filter(|s| !s.applied) {
        doc.remove_tag(s.tag, s.range());
    }
    for s in snapshots.iter().filter(|s| s.applied) {
        doc.apply_tag(s.tag, s.range());
    }
}

/// Replay recorded tag deltas in the order they happened.
pub fn replay_deltas<D: Document + ?Sized>(doc: &mut D, deltas: &[TagSnapshot]) {
    for s in deltas {
        if s.applied {
            doc.apply_tag(s.tag, s.range());
        } else {
            doc.remove_tag(s.tag, s.range());
        }
    }
}
