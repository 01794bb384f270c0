//! Undo/redo transaction engine for styled text.
//!
//! The engine records reversible operations (insertions, deletions, tag
//! rewrites, justification swaps, selection changes, format-mode switches)
//! as the owner applies them, coalesces keystroke runs into single steps, and
//! replays transactions backwards or forwards against any
//! [`core_document::Document`].
//!
//! Layout:
//! * [`snapshot`]: tag coverage capture and restore.
//! * [`operation`]: the operation sum type and its merge predicates.
//! * [`transaction`]: transactions and the bounded two-stack log.
//! * `replay`: inverse and forward application.
//! * [`engine`]: the public [`UndoEngine`] with grouping, freeze and
//!   allocation-failure handling.

pub mod alloc;
pub mod engine;
mod error;
pub mod operation;
mod replay;
pub mod snapshot;
pub mod transaction;

pub use alloc::{HistoryAllocator, SystemAllocator};
pub use engine::UndoEngine;
pub use error::UndoError;
pub use operation::{Operation, OperationKind};
pub use snapshot::{TagSnapshot, apply_snapshots, capture, capture_from_toggles};
pub use transaction::{
    DEFAULT_UNDO_LEVEL, MAX_UNDO_LEVEL, MIN_UNDO_LEVEL, Transaction, TransactionLog,
};
