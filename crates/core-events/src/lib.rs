//! Notification types emitted by the undo engine.
//!
//! Delivery is pull-based: the engine appends to an [`EventQueue`] while it
//! records or replays, and the owner drains the queue after each call. The
//! engine runs synchronously on the owner's thread, so no channel is needed;
//! ordering within the queue is emission order.

use core_document::Justification;
use std::collections::VecDeque;
use tracing::trace;

/// Events the engine reports to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoEvent {
    /// Undo availability changed.
    CanUndo(bool),
    /// Redo availability changed.
    CanRedo(bool),
    /// Replay switched the document between plain and rich text.
    FormatChanged { rich_text: bool },
    /// Replay restored a last-line justification value.
    LastLineJustify(Justification),
    /// An allocation for undo history failed; history was degraded.
    NoMemory,
}

impl UndoEvent {
    /// Stable identifier used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            UndoEvent::CanUndo(_) => "can_undo",
            UndoEvent::CanRedo(_) => "can_redo",
            UndoEvent::FormatChanged { .. } => "fmt_changed",
            UndoEvent::LastLineJustify(_) => "last_line_justify",
            UndoEvent::NoMemory => "no_memory",
        }
    }
}

/// FIFO of pending notifications.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<UndoEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: UndoEvent) {
        trace!(target: "undo.events", event = event.name(), queued = self.pending.len() + 1, "emit");
        self.pending.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<UndoEvent> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
