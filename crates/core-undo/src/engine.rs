use core_document::{Document, Justification, TagId};
use core_events::{EventQueue, UndoEvent};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, trace, warn};

use crate::alloc::{self, HistoryAllocator, SystemAllocator};
use crate::error::UndoError;
use crate::operation::{Operation, OperationKind, ends_with_space, is_atomic, starts_with_space};
use crate::replay;
use crate::snapshot::{self, TagSnapshot};
use crate::transaction::{DEFAULT_UNDO_LEVEL, Transaction, TransactionLog};

/// Records reversible operations into transactions and replays them.
///
/// The owner calls a `record_*` method *before* mutating the document (the
/// engine may need to read text or tags that the mutation destroys), brackets
/// multi-step user actions with [`begin_transaction`](Self::begin_transaction)
/// / [`end_transaction`](Self::end_transaction), and drains notifications with
/// [`drain_events`](Self::drain_events) after each call.
pub struct UndoEngine {
    log: TransactionLog,
    events: EventQueue,
    allocator: Box<dyn HistoryAllocator>,
    /// The most recent operation of the undo top is still open for merging.
    pending: bool,
    group_nesting: u32,
    first_in_group: bool,
    disabled_count: u32,
    low_memory: bool,
    disable_current_group: bool,
    last_char_is_space: bool,
    undo_sent: bool,
    redo_sent: bool,
    merged_operations: AtomicU64,
    dropped_operations: AtomicU64,
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LEVEL)
    }
}

impl UndoEngine {
    pub fn new(max_depth: usize) -> Self {
        Self::with_allocator(max_depth, Box::new(SystemAllocator))
    }

    pub fn with_allocator(max_depth: usize, allocator: Box<dyn HistoryAllocator>) -> Self {
        Self {
            log: TransactionLog::new(max_depth),
            events: EventQueue::new(),
            allocator,
            pending: false,
            group_nesting: 0,
            first_in_group: false,
            disabled_count: 0,
            low_memory: false,
            disable_current_group: false,
            last_char_is_space: false,
            undo_sent: false,
            redo_sent: false,
            merged_operations: AtomicU64::new(0),
            dropped_operations: AtomicU64::new(0),
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.low_memory && self.log.undo_depth() > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.low_memory && self.log.redo_depth() > 0
    }

    /// Recording is neither frozen nor suspended by low-memory mode.
    pub fn is_enabled(&self) -> bool {
        self.disabled_count == 0 && !self.low_memory
    }

    pub fn is_low_memory(&self) -> bool {
        self.low_memory
    }

    pub fn undo_depth(&self) -> usize {
        self.log.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.log.redo_depth()
    }

    pub fn max_depth(&self) -> usize {
        self.log.max_depth()
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Operations folded into an existing one instead of being stored.
    pub fn merged_operations(&self) -> u64 {
        self.merged_operations.load(Ordering::Relaxed)
    }

    /// Record calls that failed to allocate. Calls suppressed afterwards in
    /// the same transaction are not counted.
    pub fn dropped_operations(&self) -> u64 {
        self.dropped_operations.load(Ordering::Relaxed)
    }

    pub fn evicted_transactions(&self) -> u64 {
        self.log.evicted()
    }

    pub fn drain_events(&mut self) -> Vec<UndoEvent> {
        self.events.drain()
    }

    // ---- lifecycle ----

    pub fn freeze(&mut self) {
        self.disabled_count += 1;
        trace!(target: "undo.lifecycle", disabled = self.disabled_count, "freeze");
    }

    pub fn thaw(&mut self) {
        if self.disabled_count == 0 {
            debug!(target: "undo.lifecycle", "thaw_without_freeze");
            return;
        }
        self.disabled_count -= 1;
        trace!(target: "undo.lifecycle", disabled = self.disabled_count, "thaw");
    }

    pub fn begin_transaction(&mut self) {
        if self.group_nesting == 0 {
            self.first_in_group = true;
            self.disable_current_group = false;
        }
        self.group_nesting += 1;
        trace!(target: "undo.lifecycle", nesting = self.group_nesting, "begin_transaction");
    }

    pub fn end_transaction(&mut self) {
        if self.group_nesting == 0 {
            debug!(target: "undo.lifecycle", "end_transaction_unbalanced");
            return;
        }
        self.group_nesting -= 1;
        if self.group_nesting == 0 {
            self.first_in_group = false;
            self.disable_current_group = false;
        }
        trace!(target: "undo.lifecycle", nesting = self.group_nesting, "end_transaction");
    }

    /// End mergeability of the pending operation and detach from it, so the
    /// next recorded operation starts a fresh transaction.
    pub fn reset_merge_state(&mut self) {
        if let Some(op) = self.pending_op_mut() {
            op.mergeable = false;
        }
        self.pending = false;
    }

    /// Clear both stacks.
    pub fn reset_all(&mut self) {
        self.reset_merge_state();
        self.log.clear();
        trace!(target: "undo.lifecycle", "reset_all");
        self.send_signals();
    }

    pub fn set_max_depth(&mut self, depth: usize) {
        let applied = self.log.set_max_depth(depth);
        if applied != depth {
            info!(target: "undo.lifecycle", requested = depth, applied, "max_depth_clamped");
        }
        self.send_signals();
    }

    /// Entering low-memory mode drops all history. While active, recording
    /// and replay are no-ops.
    pub fn set_low_memory(&mut self, low_memory: bool) {
        if low_memory == self.low_memory {
            return;
        }
        if low_memory {
            self.reset_all();
        }
        self.low_memory = low_memory;
        info!(target: "undo.lifecycle", low_memory, "low_memory_mode");
        self.send_signals();
    }

    // ---- recording ----

    pub fn record_insert(&mut self, offset: usize, text: &str) {
        if !self.accepting() || text.is_empty() {
            return;
        }
        let result = self.try_record_insert(offset, text);
        self.settle(result);
    }

    pub fn record_delete<D: Document + ?Sized>(&mut self, doc: &D, range: Range<usize>) {
        let len = doc.char_count();
        let range = range.start.min(len)..range.end.min(len);
        if !self.accepting() || range.start >= range.end {
            return;
        }
        let result = self.try_record_delete(doc, range);
        self.settle(result);
    }

    /// Capture the current formatting of `range` ahead of a tag rewrite.
    pub fn record_tag_change<D: Document + ?Sized>(&mut self, doc: &D, range: Range<usize>) {
        if !self.accepting() || range.start >= range.end {
            return;
        }
        let result = self.try_record_tag_change(doc, range);
        self.settle(result);
    }

    /// Attach a tag delta to the pending operation so redo can replay it.
    pub fn record_tag_apply(&mut self, range: Range<usize>, tag: TagId, applied: bool) {
        if !self.accepting() || range.start >= range.end {
            return;
        }
        let result = self.try_record_tag_apply(range, tag, applied);
        self.settle(result);
    }

    pub fn record_justify_change(&mut self, range: Range<usize>, prior_tag: TagId, new_tag: Option<TagId>) {
        if !self.accepting() {
            return;
        }
        let op = Operation::new(
            OperationKind::SimpleJustify {
                range,
                prior_tag,
                new_tag,
            },
            false,
        );
        let result = self.admit(op);
        self.settle(result);
    }

    /// Zero-width selections only end the pending selection's run.
    pub fn record_selection(&mut self, range: Range<usize>) {
        if !self.accepting() {
            return;
        }
        if range.is_empty() {
            if let Some(op) = self.pending_op_mut()
                && matches!(op.kind, OperationKind::SelectionChange { .. })
            {
                op.mergeable = false;
            }
            return;
        }
        if self.pending_op().is_some_and(|op| op.accepts_selection(&range)) {
            if let Some(Operation {
                kind: OperationKind::SelectionChange { range: current },
                ..
            }) = self.pending_op_mut()
            {
                *current = range;
            }
            self.note_merge("selection");
            return;
        }
        let op = Operation::new(OperationKind::SelectionChange { range }, true);
        let result = self.admit(op);
        self.settle(result);
    }

    /// Record a plain/rich switch. Leaving rich text captures every tag in
    /// the document so undo can put them back.
    pub fn record_format_mode_change<D: Document + ?Sized>(&mut self, doc: &D, to_rich_text: bool) {
        if !self.accepting() {
            return;
        }
        let tag_snapshots = if to_rich_text {
            Vec::new()
        } else {
            snapshot::capture(doc, 0..doc.char_count())
        };
        trace!(target: "undo.record", to_rich_text, snapshots = tag_snapshots.len(), "format_mode_change");
        let op = Operation::new(
            OperationKind::FormatModeChange {
                to_rich_text,
                tag_snapshots,
            },
            false,
        );
        let result = self.admit(op);
        self.settle(result);
    }

    pub fn record_last_line_justify(&mut self, old: Justification, new: Justification) {
        if !self.accepting() {
            return;
        }
        let op = Operation::new(OperationKind::LastLineJustifyChange { old, new }, false);
        let result = self.admit(op);
        self.settle(result);
    }

    // ---- replay ----

    pub fn undo<D: Document + ?Sized>(&mut self, doc: &mut D) -> bool {
        if self.low_memory {
            debug!(target: "undo.replay", "undo_refused_low_memory");
            return false;
        }
        self.reset_merge_state();
        let Some(tx) = self.log.pop_undo() else {
            return false;
        };
        trace!(target: "undo.replay", ops = tx.len(), undo_depth = self.log.undo_depth(), redo_depth = self.log.redo_depth(), "undo_pop");
        self.freeze();
        doc.begin_atomic_edit();
        let previous = self.log.undo_top().and_then(Transaction::most_recent);
        let cursor = replay::undo_transaction(doc, &mut self.events, &tx, previous);
        if let Some(offset) = cursor {
            doc.place_cursor(offset);
        }
        doc.end_atomic_edit();
        self.thaw();
        self.log.push_redo(tx);
        self.reset_merge_state();
        self.send_signals();
        true
    }

    pub fn redo<D: Document + ?Sized>(&mut self, doc: &mut D) -> bool {
        if self.low_memory {
            debug!(target: "undo.replay", "redo_refused_low_memory");
            return false;
        }
        self.reset_merge_state();
        let Some(tx) = self.log.pop_redo() else {
            return false;
        };
        trace!(target: "undo.replay", ops = tx.len(), undo_depth = self.log.undo_depth(), redo_depth = self.log.redo_depth(), "redo_pop");
        self.freeze();
        doc.begin_atomic_edit();
        let previous = self.log.redo_top().and_then(Transaction::most_recent);
        let cursor = replay::redo_transaction(doc, &mut self.events, &tx, previous);
        if let Some(offset) = cursor {
            doc.place_cursor(offset);
        }
        doc.end_atomic_edit();
        self.thaw();
        self.log.push_undo(tx);
        self.reset_merge_state();
        self.send_signals();
        true
    }

    // ---- internals ----

    fn accepting(&self) -> bool {
        self.disabled_count == 0 && !self.low_memory && !self.disable_current_group
    }

    fn pending_op(&self) -> Option<&Operation> {
        if !self.pending {
            return None;
        }
        self.log.undo_top().and_then(Transaction::most_recent)
    }

    fn pending_op_mut(&mut self) -> Option<&mut Operation> {
        if !self.pending {
            return None;
        }
        self.log.undo_top_mut().and_then(Transaction::most_recent_mut)
    }

    fn try_record_insert(&mut self, offset: usize, text: &str) -> Result<(), UndoError> {
        let len = text.chars().count();
        let atomic = is_atomic(text);
        let space = starts_with_space(text);
        let last_space = self.last_char_is_space;
        let merges = atomic
            && self
                .pending_op()
                .is_some_and(|op| op.accepts_insert(offset, space, last_space));
        if merges {
            self.allocator.reserve(text.len())?;
            self.pending_op_mut()
                .ok_or(UndoError::InvariantViolation("pending insert vanished"))?
                .absorb_insert(text, len)?;
            self.last_char_is_space = space;
            self.note_merge("insert");
            return Ok(());
        }
        self.allocator
            .reserve(std::mem::size_of::<Operation>() + text.len())?;
        // A batch never merges into its predecessor, but the next keystroke
        // may still extend it unless it broke a line.
        let open = !text.contains('\n');
        let op = Operation::new(
            OperationKind::Insert {
                range: offset..offset + len,
                text: alloc::copy_text(text)?,
                tags: Vec::new(),
            },
            open,
        );
        self.push_operation(op)?;
        self.last_char_is_space = ends_with_space(text);
        trace!(target: "undo.record", offset, chars = len, atomic, "insert");
        Ok(())
    }

    fn try_record_delete<D: Document + ?Sized>(&mut self, doc: &D, range: Range<usize>) -> Result<(), UndoError> {
        let removed = doc.text(range.clone());
        let atomic = is_atomic(&removed);
        let space = starts_with_space(&removed);
        let backspace = range.start < doc.cursor();
        let edge = if backspace { range.start } else { range.end };
        let still_mergeable = atomic && !doc.toggles_tag_at(edge);
        let last_space = self.last_char_is_space;
        let merges = atomic
            && self
                .pending_op()
                .is_some_and(|op| op.accepts_delete(&range, backspace, space, last_space));

        let snapshots = snapshot::capture(doc, range.clone());
        let payload = removed.len() + snapshots.len() * std::mem::size_of::<TagSnapshot>();
        if merges {
            self.allocator.reserve(payload)?;
            self.pending_op_mut()
                .ok_or(UndoError::InvariantViolation("pending delete vanished"))?
                .absorb_delete(range, &removed, snapshots, still_mergeable)?;
            self.last_char_is_space = space;
            self.note_merge("delete");
            return Ok(());
        }
        self.allocator
            .reserve(std::mem::size_of::<Operation>() + payload)?;
        trace!(target: "undo.record", start = range.start, end = range.end, backspace, snapshots = snapshots.len(), "delete");
        let op = Operation::new(
            OperationKind::Delete {
                range,
                removed_text: removed,
                tag_snapshots: snapshots,
                backspace,
            },
            still_mergeable,
        );
        self.push_operation(op)?;
        self.last_char_is_space = space;
        Ok(())
    }

    fn try_record_tag_change<D: Document + ?Sized>(&mut self, doc: &D, range: Range<usize>) -> Result<(), UndoError> {
        let tag_snapshots = snapshot::capture(doc, range.clone());
        trace!(target: "undo.record", start = range.start, end = range.end, snapshots = tag_snapshots.len(), "tag_change");
        self.admit(Operation::new(
            OperationKind::TagChange {
                range,
                tag_snapshots,
                tags: Vec::new(),
            },
            false,
        ))
    }

    fn try_record_tag_apply(&mut self, range: Range<usize>, tag: TagId, applied: bool) -> Result<(), UndoError> {
        let has_target = self.pending_op().is_some_and(|op| match &op.kind {
            OperationKind::Insert { .. } | OperationKind::FormatModeChange { .. } => true,
            OperationKind::TagChange { range: own, .. } => own.start <= range.start && range.end <= own.end,
            _ => false,
        });
        if !has_target {
            debug!(target: "undo.record", tag = tag.0, applied, "tag_apply_without_target");
            return Ok(());
        }
        self.allocator.reserve(std::mem::size_of::<TagSnapshot>())?;
        let delta = TagSnapshot::new(tag, range, applied);
        let op = self
            .pending_op_mut()
            .ok_or(UndoError::InvariantViolation("pending operation vanished"))?;
        let list = match &mut op.kind {
            OperationKind::Insert { tags, .. } | OperationKind::TagChange { tags, .. } => tags,
            OperationKind::FormatModeChange { tag_snapshots, .. } => tag_snapshots,
            _ => return Err(UndoError::InvariantViolation("tag delta on untaggable operation")),
        };
        alloc::grow(list, 1)?;
        list.push(delta);
        trace!(target: "undo.record", tag = tag.0, applied, "tag_apply");
        Ok(())
    }

    /// Reserve storage for a freshly built operation and push it.
    fn admit(&mut self, op: Operation) -> Result<(), UndoError> {
        self.allocator.reserve(op.footprint())?;
        self.push_operation(op)
    }

    /// Grouping rule: outside a transaction, or for the first operation of
    /// one, start fresh. Otherwise append to the open transaction.
    fn push_operation(&mut self, op: Operation) -> Result<(), UndoError> {
        if self.group_nesting == 0 || self.first_in_group {
            self.first_in_group = false;
            self.reset_merge_state();
        } else if let Some(prev) = self.pending_op_mut() {
            prev.mergeable = false;
        }
        let kind = op.kind_name();
        if self.pending {
            self.log
                .undo_top_mut()
                .ok_or(UndoError::InvariantViolation("pending without open transaction"))?
                .push(op)?;
        } else {
            self.log.push_new(Transaction::with_first(op)?)?;
        }
        self.pending = true;
        self.log.clear_redo();
        trace!(target: "undo.record", kind, undo_depth = self.log.undo_depth(), nesting = self.group_nesting, "operation_recorded");
        self.send_signals();
        Ok(())
    }

    fn note_merge(&mut self, kind: &'static str) {
        self.merged_operations.fetch_add(1, Ordering::Relaxed);
        self.log.clear_redo();
        trace!(target: "undo.merge", kind, "merged_into_pending");
        self.send_signals();
    }

    fn settle(&mut self, result: Result<(), UndoError>) {
        match result {
            Ok(()) => {}
            Err(UndoError::AllocationFailed { bytes }) => self.on_allocation_failure(bytes),
            Err(err @ UndoError::InvariantViolation(_)) => {
                error!(target: "undo.record", error = %err, "operation_ignored");
            }
        }
    }

    /// Notify, reclaim the newest completed transaction if the open one
    /// already holds work, then drop the rest of the open transaction.
    fn on_allocation_failure(&mut self, bytes: usize) {
        warn!(target: "undo.memory", bytes, nesting = self.group_nesting, "history_allocation_failed");
        self.events.push(UndoEvent::NoMemory);
        self.dropped_operations.fetch_add(1, Ordering::Relaxed);
        if !self.first_in_group && !self.disable_current_group {
            let top_is_open = self.group_nesting > 0;
            if let Some(tx) = self.log.evict_newest_completed(top_is_open) {
                if !top_is_open {
                    self.pending = false;
                }
                warn!(target: "undo.memory", ops = tx.len(), undo_depth = self.log.undo_depth(), "completed_transaction_evicted");
                self.send_signals();
            }
        }
        self.disable_current_group = self.group_nesting > 0;
    }

    /// Emit availability events on edges only.
    fn send_signals(&mut self) {
        let can_redo = self.can_redo();
        if can_redo != self.redo_sent {
            self.redo_sent = can_redo;
            self.events.push(UndoEvent::CanRedo(can_redo));
        }
        let can_undo = self.can_undo();
        if can_undo != self.undo_sent {
            self.undo_sent = can_undo;
            self.events.push(UndoEvent::CanUndo(can_undo));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_document::StyledBuffer;

    fn doc(text: &str) -> StyledBuffer {
        StyledBuffer::from_str("t", text).unwrap()
    }

    fn type_at(engine: &mut UndoEngine, d: &mut StyledBuffer, offset: usize, text: &str) {
        engine.record_insert(offset, text);
        d.insert(offset, text);
    }

    #[test]
    fn adjacent_atomic_inserts_coalesce() {
        let mut d = doc("");
        let mut e = UndoEngine::default();
        for (i, c) in ["a", "b", "c"].into_iter().enumerate() {
            type_at(&mut e, &mut d, i, c);
        }
        assert_eq!(e.undo_depth(), 1);
        assert_eq!(e.merged_operations(), 2);
        assert!(e.undo(&mut d));
        assert_eq!(d.content(), "");
    }

    #[test]
    fn word_after_space_starts_new_transaction() {
        let mut d = doc("");
        let mut e = UndoEngine::default();
        for (i, c) in "foo bar".chars().enumerate() {
            type_at(&mut e, &mut d, i, &c.to_string());
        }
        assert_eq!(e.undo_depth(), 2);
        assert!(e.undo(&mut d));
        assert_eq!(d.content(), "foo ");
    }

    #[test]
    fn keystroke_extends_a_batch() {
        let mut d = doc("");
        let mut e = UndoEngine::default();
        type_at(&mut e, &mut d, 0, "foo");
        type_at(&mut e, &mut d, 3, " ");
        type_at(&mut e, &mut d, 4, "bar");
        assert_eq!(e.undo_depth(), 2);
        assert!(e.undo(&mut d));
        assert_eq!(d.content(), "foo ");
    }

    #[test]
    fn newline_is_never_merged() {
        let mut d = doc("");
        let mut e = UndoEngine::default();
        type_at(&mut e, &mut d, 0, "a");
        type_at(&mut e, &mut d, 1, "\n");
        type_at(&mut e, &mut d, 2, "b");
        assert_eq!(e.undo_depth(), 3);
    }

    #[test]
    fn frozen_engine_records_nothing() {
        let mut e = UndoEngine::default();
        e.freeze();
        e.freeze();
        e.thaw();
        assert!(!e.is_enabled());
        e.record_insert(0, "x");
        assert_eq!(e.undo_depth(), 0);
        e.thaw();
        assert!(e.is_enabled());
        e.record_insert(0, "x");
        assert_eq!(e.undo_depth(), 1);
    }

    #[test]
    fn nested_boundaries_make_one_transaction() {
        let mut e = UndoEngine::default();
        e.begin_transaction();
        e.record_insert(0, "hello");
        e.begin_transaction();
        e.record_insert(5, "\n");
        e.end_transaction();
        e.record_last_line_justify(Justification::Left, Justification::Right);
        e.end_transaction();
        assert_eq!(e.undo_depth(), 1);
        assert_eq!(e.log().undo_top().unwrap().len(), 3);
    }

    #[test]
    fn availability_events_fire_on_edges() {
        let mut d = doc("");
        let mut e = UndoEngine::default();
        type_at(&mut e, &mut d, 0, "a");
        type_at(&mut e, &mut d, 1, "\n");
        assert_eq!(e.drain_events(), vec![UndoEvent::CanUndo(true)]);
        e.undo(&mut d);
        assert_eq!(e.drain_events(), vec![UndoEvent::CanRedo(true)]);
        e.undo(&mut d);
        assert_eq!(e.drain_events(), vec![UndoEvent::CanUndo(false)]);
    }

    #[test]
    fn pending_selection_is_replaced_on_shared_edge() {
        let mut e = UndoEngine::default();
        e.record_selection(2..4);
        e.record_selection(2..7);
        e.record_selection(0..7);
        assert_eq!(e.undo_depth(), 1);
        assert_eq!(e.log().undo_top().unwrap().most_recent().unwrap().range(), Some(0..7));
        e.record_selection(3..3);
        e.record_selection(0..9);
        assert_eq!(e.undo_depth(), 2);
    }

    #[test]
    fn tag_apply_without_target_is_ignored() {
        let mut e = UndoEngine::default();
        e.record_justify_change(0..3, TagId(1), None);
        e.record_tag_apply(0..3, TagId(2), true);
        let top = e.log().undo_top().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top.most_recent().unwrap().kind_name(), "simple_justify");
    }

    #[test]
    fn delete_range_is_clamped_to_document() {
        let mut d = doc("abc");
        let mut e = UndoEngine::default();
        e.record_delete(&d, 5..7);
        assert_eq!(e.undo_depth(), 0);

        e.record_delete(&d, 2..7);
        d.delete(2..7);
        let top = e.log().undo_top().unwrap();
        assert_eq!(top.most_recent().unwrap().range(), Some(2..3));
        assert!(e.undo(&mut d));
        assert_eq!(d.content(), "abc");
    }

    #[test]
    fn unbalanced_end_is_ignored() {
        let mut e = UndoEngine::default();
        e.end_transaction();
        e.record_insert(0, "a");
        e.record_insert(1, "b");
        assert_eq!(e.undo_depth(), 1);
    }
}
