//! Reversible operations and the merge policy that coalesces them.

use core_document::{Justification, TagId};
use std::ops::Range;

use crate::alloc;
use crate::error::UndoError;
use crate::snapshot::TagSnapshot;

/// One reversible change recorded into a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Whether a following atomic edit may still fold into this one. Once
    /// cleared it is never set again.
    pub mergeable: bool,
    pub kind: OperationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// `text` now occupies `range`. `tags` are the tag applications recorded
    /// against the inserted run; redo replays them.
    Insert {
        range: Range<usize>,
        text: String,
        tags: Vec<TagSnapshot>,
    },
    /// `removed_text` used to occupy `range`, formatted as `tag_snapshots`.
    Delete {
        range: Range<usize>,
        removed_text: String,
        tag_snapshots: Vec<TagSnapshot>,
        backspace: bool,
    },
    /// Tags over `range` were rewritten. `tag_snapshots` is the prior
    /// coverage, `tags` the deltas applied afterwards.
    TagChange {
        range: Range<usize>,
        tag_snapshots: Vec<TagSnapshot>,
        tags: Vec<TagSnapshot>,
    },
    SimpleJustify {
        range: Range<usize>,
        prior_tag: TagId,
        new_tag: Option<TagId>,
    },
    SelectionChange {
        range: Range<usize>,
    },
    /// Whole-document plain/rich switch; snapshots cover the entire document.
    FormatModeChange {
        to_rich_text: bool,
        tag_snapshots: Vec<TagSnapshot>,
    },
    LastLineJustifyChange {
        old: Justification,
        new: Justification,
    },
}

impl Operation {
    pub fn new(kind: OperationKind, mergeable: bool) -> Self {
        Self { mergeable, kind }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            OperationKind::Insert { .. } => "insert",
            OperationKind::Delete { .. } => "delete",
            OperationKind::TagChange { .. } => "tag_change",
            OperationKind::SimpleJustify { .. } => "simple_justify",
            OperationKind::SelectionChange { .. } => "selection",
            OperationKind::FormatModeChange { .. } => "format_mode",
            OperationKind::LastLineJustifyChange { .. } => "last_line_justify",
        }
    }

    /// Offset range the operation touches, if it has one.
    pub fn range(&self) -> Option<Range<usize>> {
        match &self.kind {
            OperationKind::Insert { range, .. }
            | OperationKind::Delete { range, .. }
            | OperationKind::TagChange { range, .. }
            | OperationKind::SimpleJustify { range, .. }
            | OperationKind::SelectionChange { range } => Some(range.clone()),
            OperationKind::FormatModeChange { .. } | OperationKind::LastLineJustifyChange { .. } => {
                None
            }
        }
    }

    /// Rough heap + inline footprint, used when reserving history storage.
    pub fn footprint(&self) -> usize {
        let snaps = |v: &Vec<TagSnapshot>| v.len() * std::mem::size_of::<TagSnapshot>();
        std::mem::size_of::<Self>()
            + match &self.kind {
                OperationKind::Insert { text, tags, .. } => text.len() + snaps(tags),
                OperationKind::Delete {
                    removed_text,
                    tag_snapshots,
                    ..
                } => removed_text.len() + snaps(tag_snapshots),
                OperationKind::TagChange {
                    tag_snapshots,
                    tags,
                    ..
                } => snaps(tag_snapshots) + snaps(tags),
                OperationKind::FormatModeChange { tag_snapshots, .. } => snaps(tag_snapshots),
                _ => 0,
            }
    }

    /// Would an atomic insert at `start` fold into this operation?
    pub(crate) fn accepts_insert(&self, start: usize, incoming_space: bool, last_space: bool) -> bool {
        match &self.kind {
            OperationKind::Insert { range, .. } => {
                self.mergeable && range.end == start && (incoming_space || !last_space)
            }
            _ => false,
        }
    }

    /// Would an atomic delete of `incoming` fold into this operation?
    ///
    /// Backspace runs grow leftwards (`incoming.end` meets our start). Forward
    /// deletes keep hitting the same offset because the text shifts left.
    pub(crate) fn accepts_delete(
        &self,
        incoming: &Range<usize>,
        backspace: bool,
        incoming_space: bool,
        last_space: bool,
    ) -> bool {
        match &self.kind {
            OperationKind::Delete {
                range,
                backspace: prev_backspace,
                ..
            } => {
                let adjacent = if backspace {
                    range.start == incoming.end
                } else {
                    range.start == incoming.start
                };
                self.mergeable
                    && *prev_backspace == backspace
                    && adjacent
                    && (incoming_space || !last_space)
            }
            _ => false,
        }
    }

    /// Would a selection of `incoming` replace this pending selection?
    pub(crate) fn accepts_selection(&self, incoming: &Range<usize>) -> bool {
        match &self.kind {
            OperationKind::SelectionChange { range } => {
                self.mergeable
                    && !incoming.is_empty()
                    && (range.start == incoming.start || range.end == incoming.end)
            }
            _ => false,
        }
    }

    pub(crate) fn absorb_insert(&mut self, text: &str, incoming_len: usize) -> Result<(), UndoError> {
        if let OperationKind::Insert {
            range, text: run, ..
        } = &mut self.kind
        {
            run.try_reserve(text.len())
                .map_err(|_| UndoError::AllocationFailed { bytes: text.len() })?;
            run.push_str(text);
            range.end += incoming_len;
            return Ok(());
        }
        Err(UndoError::InvariantViolation("absorb_insert on non-insert"))
    }

    /// Fold an atomic delete in. Snapshots are rebased so that reinserting
    /// the combined text at the combined start restores them exactly.
    pub(crate) fn absorb_delete(
        &mut self,
        incoming: Range<usize>,
        removed: &str,
        snapshots: Vec<TagSnapshot>,
        still_mergeable: bool,
    ) -> Result<(), UndoError> {
        let OperationKind::Delete {
            range,
            removed_text,
            tag_snapshots,
            backspace,
        } = &mut self.kind
        else {
            return Err(UndoError::InvariantViolation("absorb_delete on non-delete"));
        };
        let mut joined = String::new();
        joined
            .try_reserve_exact(removed_text.len() + removed.len())
            .map_err(|_| UndoError::AllocationFailed {
                bytes: removed_text.len() + removed.len(),
            })?;
        alloc::grow(tag_snapshots, snapshots.len())?;
        if *backspace {
            joined.push_str(removed);
            joined.push_str(removed_text);
            range.start = incoming.start;
            tag_snapshots.extend(snapshots);
        } else {
            let offset = range.end - range.start;
            joined.push_str(removed_text);
            joined.push_str(removed);
            range.end += incoming.end - incoming.start;
            tag_snapshots.extend(snapshots.into_iter().map(|s| s.shifted(offset)));
        }
        *removed_text = joined;
        self.mergeable = still_mergeable;
        Ok(())
    }
}

/// A single character other than a newline. Only atomic edits may merge.
pub(crate) fn is_atomic(text: &str) -> bool {
    let mut chars = text.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c != '\n')
}

pub(crate) fn starts_with_space(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

pub(crate) fn ends_with_space(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_whitespace)
}
