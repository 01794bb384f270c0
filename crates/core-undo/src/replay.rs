//! Inverse and forward application of recorded transactions.
//!
//! Each function walks one transaction against the document and returns the
//! cursor offset proposed by the last operation that proposes one. The caller
//! owns the freeze and atomic-edit brackets.

use core_document::Document;
use core_events::{EventQueue, UndoEvent};
use std::ops::Range;
use tracing::trace;

use crate::operation::{Operation, OperationKind};
use crate::snapshot::{apply_snapshots, replay_deltas};
use crate::transaction::Transaction;

/// Undo `tx`, most recent operation first. `previous` is the most recent
/// operation left on the undo stack, consulted by selection restore.
pub(crate) fn undo_transaction<D: Document + ?Sized>(
    doc: &mut D,
    events: &mut EventQueue,
    tx: &Transaction,
    previous: Option<&Operation>,
) -> Option<usize> {
    let mut cursor = None;
    for op in tx.reverse_order() {
        trace!(target: "undo.replay", kind = op.kind_name(), "undo_op");
        match &op.kind {
            OperationKind::Insert { range, .. } => {
                doc.delete(range.clone());
                cursor = Some(range.start);
            }
            OperationKind::Delete {
                range,
                removed_text,
                tag_snapshots,
                backspace,
            } => {
                let inserted = doc.insert(range.start, removed_text);
                doc.clear_all_tags(inserted);
                apply_snapshots(doc, tag_snapshots);
                cursor = Some(if *backspace { range.end } else { range.start });
            }
            OperationKind::TagChange {
                range,
                tag_snapshots,
                ..
            } => {
                doc.set_selection(range.start, range.end);
                doc.clear_all_tags(range.clone());
                apply_snapshots(doc, tag_snapshots);
            }
            OperationKind::SimpleJustify {
                range,
                prior_tag,
                new_tag,
            } => {
                if let Some(tag) = new_tag {
                    doc.remove_tag(*tag, range.clone());
                }
                doc.apply_tag(*prior_tag, range.clone());
            }
            OperationKind::SelectionChange { range } => {
                restore_selection(doc, range, previous, true);
            }
            OperationKind::FormatModeChange {
                to_rich_text,
                tag_snapshots,
            } => {
                if *to_rich_text {
                    let all = 0..doc.char_count();
                    doc.clear_all_tags(all);
                } else {
                    apply_snapshots(doc, tag_snapshots);
                    cursor = None;
                }
                events.push(UndoEvent::FormatChanged {
                    rich_text: !*to_rich_text,
                });
            }
            OperationKind::LastLineJustifyChange { old, .. } => {
                events.push(UndoEvent::LastLineJustify(*old));
            }
        }
    }
    cursor
}

/// Redo `tx` in chronological order. `previous` is the most recent operation
/// left on the redo stack, consulted by selection restore.
pub(crate) fn redo_transaction<D: Document + ?Sized>(
    doc: &mut D,
    events: &mut EventQueue,
    tx: &Transaction,
    previous: Option<&Operation>,
) -> Option<usize> {
    let mut cursor = None;
    for op in tx.chronological_order() {
        trace!(target: "undo.replay", kind = op.kind_name(), "redo_op");
        match &op.kind {
            OperationKind::Insert { range, text, tags } => {
                let inserted = doc.insert(range.start, text);
                replay_deltas(doc, tags);
                cursor = Some(inserted.end);
            }
            OperationKind::Delete { range, .. } => {
                doc.delete(range.clone());
                cursor = Some(range.start);
            }
            OperationKind::TagChange { range, tags, .. } => {
                doc.set_selection(range.start, range.end);
                replay_deltas(doc, tags);
            }
            OperationKind::SimpleJustify {
                range,
                prior_tag,
                new_tag,
            } => {
                doc.remove_tag(*prior_tag, range.clone());
                if let Some(tag) = new_tag {
                    doc.apply_tag(*tag, range.clone());
                }
            }
            OperationKind::SelectionChange { range } => {
                restore_selection(doc, range, previous, true);
            }
            OperationKind::FormatModeChange {
                to_rich_text,
                tag_snapshots,
            } => {
                if *to_rich_text {
                    apply_snapshots(doc, tag_snapshots);
                } else {
                    let all = 0..doc.char_count();
                    doc.clear_all_tags(all);
                }
                events.push(UndoEvent::FormatChanged {
                    rich_text: *to_rich_text,
                });
            }
            OperationKind::LastLineJustifyChange { new, .. } => {
                events.push(UndoEvent::LastLineJustify(*new));
            }
        }
    }
    cursor
}

/// If the recorded selection is still active, fall back to the selection
/// recorded before it (one level deep), else collapse to its end.
fn restore_selection<D: Document + ?Sized>(
    doc: &mut D,
    range: &Range<usize>,
    previous: Option<&Operation>,
    may_recurse: bool,
) {
    if doc.selection() != (range.start, range.end) {
        doc.set_selection(range.start, range.end);
        return;
    }
    match previous {
        Some(Operation {
            kind: OperationKind::SelectionChange { range: prior },
            ..
        }) if may_recurse => restore_selection(doc, prior, None, false),
        _ => doc.place_cursor(range.end),
    }
}
