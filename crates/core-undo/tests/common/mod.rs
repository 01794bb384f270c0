#![allow(dead_code)] // Shared across integration tests; each binary uses a subset.

use core_document::{Document, StyledBuffer, TagId};
use core_undo::UndoEngine;
use std::ops::Range;

/// Text plus every tag span, the state a round-trip must reproduce.
pub type DocState = (String, Vec<(TagId, Range<usize>)>);

pub fn state(doc: &StyledBuffer) -> DocState {
    (doc.content(), doc.tag_spans())
}

/// Drives a buffer and an engine the way an editing owner would: record
/// first, then mutate.
pub struct Editor {
    pub doc: StyledBuffer,
    pub undo: UndoEngine,
}

impl Editor {
    pub fn new(text: &str) -> Self {
        Self::with_engine(text, UndoEngine::default())
    }

    pub fn with_engine(text: &str, undo: UndoEngine) -> Self {
        let mut doc = StyledBuffer::from_str("test", text).unwrap();
        let end = doc.char_count();
        doc.place_cursor(end);
        Self { doc, undo }
    }

    /// Insert at the cursor.
    pub fn type_str(&mut self, text: &str) {
        let at = self.doc.cursor();
        self.undo.record_insert(at, text);
        self.doc.insert(at, text);
    }

    /// Type each character as its own keystroke.
    pub fn type_chars(&mut self, text: &str) {
        for c in text.chars() {
            self.type_str(&c.to_string());
        }
    }

    pub fn backspace(&mut self) {
        let at = self.doc.cursor();
        if at == 0 {
            return;
        }
        self.undo.record_delete(&self.doc, at - 1..at);
        self.doc.delete(at - 1..at);
    }

    pub fn delete_forward(&mut self) {
        let at = self.doc.cursor();
        if at >= self.doc.char_count() {
            return;
        }
        self.undo.record_delete(&self.doc, at..at + 1);
        self.doc.delete(at..at + 1);
    }

    pub fn delete_range(&mut self, range: Range<usize>) {
        self.undo.record_delete(&self.doc, range.clone());
        self.doc.delete(range);
    }

    /// Apply `tag` over `range` as one undoable formatting command.
    pub fn apply_tag(&mut self, name: &str, range: Range<usize>) {
        let tag = self.doc.tag(name);
        self.undo.record_tag_change(&self.doc, range.clone());
        self.undo.record_tag_apply(range.clone(), tag, true);
        self.doc.apply_tag(tag, range);
    }

    pub fn remove_tag(&mut self, name: &str, range: Range<usize>) {
        let tag = self.doc.tag(name);
        self.undo.record_tag_change(&self.doc, range.clone());
        self.undo.record_tag_apply(range.clone(), tag, false);
        self.doc.remove_tag(tag, range);
    }

    /// Tag directly, bypassing history (initial document setup).
    pub fn seed_tag(&mut self, name: &str, range: Range<usize>) -> TagId {
        let tag = self.doc.tag(name);
        self.doc.apply_tag(tag, range);
        tag
    }

    pub fn move_cursor(&mut self, offset: usize) {
        self.undo.record_selection(offset..offset);
        self.doc.place_cursor(offset);
    }

    pub fn undo(&mut self) -> bool {
        self.undo.undo(&mut self.doc)
    }

    pub fn redo(&mut self) -> bool {
        self.undo.redo(&mut self.doc)
    }

    pub fn state(&self) -> DocState {
        state(&self.doc)
    }
}
