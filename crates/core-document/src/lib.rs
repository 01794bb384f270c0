//! Styled document primitives consumed by the undo engine.
//!
//! The engine never sees a concrete document type. It talks to the
//! [`Document`] trait, which exposes the small set of primitive operations a
//! styled text store must offer: text slicing, insertion, deletion, tag
//! application over offset ranges, tag-toggle iteration, and selection /
//! cursor control. [`StyledBuffer`] is the rope-backed reference
//! implementation used by the controller, the CLI and the test-suites.
//!
//! Offsets are character (Unicode scalar value) indices. Ranges are
//! half-open. Tags are opaque [`TagId`]s; how a tag maps onto a visual style
//! is the owner's business.

use std::collections::BTreeSet;
use std::ops::Range;

mod buffer;
pub mod spans;

pub use buffer::{StyledBuffer, TagTable};

/// Opaque, comparable style tag identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(pub u32);

/// A single tag boundary inside a document range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagToggle {
    pub offset: usize,
    pub tag: TagId,
    /// `true` when the tag starts covering text at `offset`, `false` when it stops.
    pub opening: bool,
}

/// Paragraph justification carried by last-line bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justification {
    #[default]
    Left,
    Center,
    Right,
    Fill,
}

/// Primitive operations the undo engine needs from a styled text store.
///
/// Implementations are assumed infallible for in-range input; out-of-range
/// offsets are clamped to the document length.
pub trait Document {
    /// Number of characters in the document.
    fn char_count(&self) -> usize;

    /// Text covered by `range`.
    fn text(&self, range: Range<usize>) -> String;

    /// Insert `text` at `offset`; returns the range now occupied by it.
    /// Inserted text carries no tags.
    fn insert(&mut self, offset: usize, text: &str) -> Range<usize>;

    /// Delete `range`; returns the offset where the deletion collapsed.
    fn delete(&mut self, range: Range<usize>) -> usize;

    fn apply_tag(&mut self, tag: TagId, range: Range<usize>);
    fn remove_tag(&mut self, tag: TagId, range: Range<usize>);
    fn clear_all_tags(&mut self, range: Range<usize>);

    /// Tags covering the character at `offset` (empty at the end of the document).
    fn tags_at(&self, offset: usize) -> BTreeSet<TagId>;

    /// Every tag boundary with `range.start <= offset <= range.end`, ordered by
    /// offset; at equal offsets closings precede openings.
    fn tag_toggle_points(&self, range: Range<usize>) -> Vec<TagToggle>;

    /// Normalized selection bounds `(start, end)`; equal when nothing is selected.
    fn selection(&self) -> (usize, usize);
    fn set_selection(&mut self, start: usize, end: usize);
    fn place_cursor(&mut self, offset: usize);
    /// Offset of the insertion cursor.
    fn cursor(&self) -> usize;

    /// Open a coalesced edit; observers see one change for the outermost bracket.
    fn begin_atomic_edit(&mut self);
    fn end_atomic_edit(&mut self);

    /// True if some tag starts or stops at `offset`.
    fn toggles_tag_at(&self, offset: usize) -> bool {
        let here = self.tags_at(offset);
        if offset == 0 {
            return !here.is_empty();
        }
        here != self.tags_at(offset - 1)
    }
}
