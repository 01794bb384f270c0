//! Transactions and the bounded undo/redo log.

use std::collections::VecDeque;
use tracing::trace;

use crate::alloc;
use crate::error::UndoError;
use crate::operation::Operation;

/// Lower bound for the configurable history depth.
pub const MIN_UNDO_LEVEL: usize = 5;
/// Upper bound for the configurable history depth.
pub const MAX_UNDO_LEVEL: usize = 200;
/// Depth used when nothing is configured.
pub const DEFAULT_UNDO_LEVEL: usize = 5;

/// One atomic user action. Operations are stored in recording order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    ops: Vec<Operation>,
}

impl Transaction {
    pub(crate) fn with_first(op: Operation) -> Result<Self, UndoError> {
        let mut ops = Vec::new();
        alloc::grow(&mut ops, 1)?;
        ops.push(op);
        Ok(Self { ops })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Most recent operation first: the order undo walks.
    pub fn reverse_order(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter().rev()
    }

    /// Oldest operation first: the order redo walks.
    pub fn chronological_order(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter()
    }

    pub fn most_recent(&self) -> Option<&Operation> {
        self.ops.last()
    }

    pub(crate) fn most_recent_mut(&mut self) -> Option<&mut Operation> {
        self.ops.last_mut()
    }

    pub(crate) fn push(&mut self, op: Operation) -> Result<(), UndoError> {
        alloc::grow(&mut self.ops, 1)?;
        self.ops.push(op);
        Ok(())
    }
}

/// Two bounded stacks. The back of each deque is its top.
#[derive(Debug)]
pub struct TransactionLog {
    undo_stack: VecDeque<Transaction>,
    redo_stack: VecDeque<Transaction>,
    max_depth: usize,
    evicted: u64,
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LEVEL)
    }
}

impl TransactionLog {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: clamp_depth(max_depth),
            evicted: 0,
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Transactions discarded by capacity or memory pressure so far.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn undo_top(&self) -> Option<&Transaction> {
        self.undo_stack.back()
    }

    pub fn redo_top(&self) -> Option<&Transaction> {
        self.redo_stack.back()
    }

    /// Undo stack from oldest to newest.
    pub fn undo_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.undo_stack.iter()
    }

    pub(crate) fn undo_top_mut(&mut self) -> Option<&mut Transaction> {
        self.undo_stack.back_mut()
    }

    /// Push a freshly materialized transaction and enforce the depth bound.
    pub(crate) fn push_new(&mut self, tx: Transaction) -> Result<(), UndoError> {
        debug_assert!(!tx.is_empty());
        self.undo_stack
            .try_reserve(1)
            .map_err(|_| UndoError::AllocationFailed {
                bytes: std::mem::size_of::<Transaction>(),
            })?;
        self.undo_stack.push_back(tx);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
            self.evicted += 1;
            trace!(target: "undo.log", undo_depth = self.undo_stack.len(), "undo_stack_trimmed");
        }
        Ok(())
    }

    pub(crate) fn pop_undo(&mut self) -> Option<Transaction> {
        self.undo_stack.pop_back()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<Transaction> {
        self.redo_stack.pop_back()
    }

    pub(crate) fn push_undo(&mut self, tx: Transaction) {
        self.undo_stack.push_back(tx);
    }

    pub(crate) fn push_redo(&mut self, tx: Transaction) {
        self.redo_stack.push_back(tx);
    }

    pub(crate) fn clear_redo(&mut self) {
        if !self.redo_stack.is_empty() {
            self.redo_stack.clear();
            trace!(target: "undo.log", "redo_stack_cleared_on_new_edit");
        }
    }

    pub(crate) fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Drop the newest transaction that is not the open one. Returns it.
    pub(crate) fn evict_newest_completed(&mut self, top_is_open: bool) -> Option<Transaction> {
        let evicted = if top_is_open {
            let len = self.undo_stack.len();
            if len >= 2 {
                self.undo_stack.remove(len - 2)
            } else {
                None
            }
        } else {
            self.undo_stack.pop_back()
        };
        if evicted.is_some() {
            self.evicted += 1;
        }
        evicted
    }

    /// Change the bound. Excess history is discarded from the oldest end of
    /// the redo stack first, then of the undo stack. Returns the clamped depth.
    pub(crate) fn set_max_depth(&mut self, depth: usize) -> usize {
        self.max_depth = clamp_depth(depth);
        let mut excess = (self.undo_stack.len() + self.redo_stack.len()).saturating_sub(self.max_depth);
        while excess > 0 && self.redo_stack.pop_front().is_some() {
            excess -= 1;
            self.evicted += 1;
        }
        while excess > 0 && self.undo_stack.pop_front().is_some() {
            excess -= 1;
            self.evicted += 1;
        }
        trace!(target: "undo.log", max_depth = self.max_depth, undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "max_depth_set");
        self.max_depth
    }
}

pub(crate) fn clamp_depth(depth: usize) -> usize {
    depth.clamp(MIN_UNDO_LEVEL, MAX_UNDO_LEVEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{Operation, OperationKind};

    fn tx(start: usize) -> Transaction {
        Transaction::with_first(Operation::new(
            OperationKind::SelectionChange {
                range: start..start + 1,
            },
            false,
        ))
        .unwrap()
    }

    #[test]
    fn push_enforces_depth_from_oldest_end() {
        let mut log = TransactionLog::new(5);
        for i in 0..7 {
            log.push_new(tx(i)).unwrap();
        }
        assert_eq!(log.undo_depth(), 5);
        assert_eq!(log.evicted(), 2);
        let first = log.undo_transactions().next().unwrap();
        assert_eq!(first.most_recent().unwrap().range(), Some(2..3));
    }

    #[test]
    fn orders_are_mirror_images() {
        let mut t = tx(0);
        t.push(Operation::new(OperationKind::SelectionChange { range: 5..6 }, false))
            .unwrap();
        let rev: Vec<_> = t.reverse_order().filter_map(Operation::range).collect();
        let chrono: Vec<_> = t.chronological_order().filter_map(Operation::range).collect();
        assert_eq!(rev, vec![5..6, 0..1]);
        assert_eq!(chrono, vec![0..1, 5..6]);
    }

    #[test]
    fn shrinking_depth_evicts_redo_first() {
        let mut log = TransactionLog::new(10);
        for i in 0..6 {
            log.push_new(tx(i)).unwrap();
        }
        for _ in 0..3 {
            let t = log.pop_undo().unwrap();
            log.push_redo(t);
        }
        assert_eq!(log.set_max_depth(5), 5);
        assert_eq!(log.redo_depth(), 2);
        assert_eq!(log.undo_depth(), 3);
        // The redo entry furthest from the present went first.
        assert_eq!(log.redo_top().unwrap().most_recent().unwrap().range(), Some(3..4));
    }

    #[test]
    fn depth_is_clamped() {
        let mut log = TransactionLog::new(1);
        assert_eq!(log.max_depth(), MIN_UNDO_LEVEL);
        assert_eq!(log.set_max_depth(1_000), MAX_UNDO_LEVEL);
    }

    #[test]
    fn eviction_skips_open_transaction() {
        let mut log = TransactionLog::new(10);
        log.push_new(tx(0)).unwrap();
        log.push_new(tx(1)).unwrap();
        log.push_new(tx(2)).unwrap();
        let gone = log.evict_newest_completed(true).unwrap();
        assert_eq!(gone.most_recent().unwrap().range(), Some(1..2));
        assert_eq!(log.undo_depth(), 2);
        assert_eq!(log.undo_top().unwrap().most_recent().unwrap().range(), Some(2..3));
    }
}
