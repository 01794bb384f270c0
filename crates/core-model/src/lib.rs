//! Editing controller that owns a styled document and its undo history.
//!
//! `RichTextModel` is the single mutation entry point for a document. Every
//! user-level edit is bracketed as one undo transaction and follows the
//! record-then-mutate protocol the engine requires: the engine is told about
//! a change while the document still holds the text and tags the change is
//! about to destroy.
//!
//! Invariants (hold after every public call):
//! * No undo transaction is left open.
//! * `rich_text == false` implies the document carries no tags.
//! * The model's mode flags agree with what replay last reported; engine
//!   notifications are consumed here and re-exposed through
//!   [`RichTextModel::drain_notifications`].

use anyhow::Result;
use core_config::Config;
use core_document::{Document, Justification, StyledBuffer, TagId};
use core_events::UndoEvent;
use core_undo::UndoEngine;
use std::collections::BTreeSet;
use std::ops::Range;
use tracing::{debug, info, trace};

/// Tag name carrying each paragraph justification.
pub fn justification_tag_name(j: Justification) -> &'static str {
    match j {
        Justification::Left => "justify-left",
        Justification::Center => "justify-center",
        Justification::Right => "justify-right",
        Justification::Fill => "justify-fill",
    }
}

const JUSTIFICATIONS: [Justification; 4] = [
    Justification::Left,
    Justification::Center,
    Justification::Right,
    Justification::Fill,
];

pub struct RichTextModel {
    doc: StyledBuffer,
    undo: UndoEngine,
    rich_text: bool,
    last_line_justification: Justification,
    /// Tags applied to the next typed text when nothing is selected.
    pending_style: BTreeSet<TagId>,
    notifications: Vec<UndoEvent>,
}

impl RichTextModel {
    pub fn new(doc: StyledBuffer, undo: UndoEngine) -> Self {
        Self {
            doc,
            undo,
            rich_text: true,
            last_line_justification: Justification::Left,
            pending_style: BTreeSet::new(),
            notifications: Vec::new(),
        }
    }

    /// Build a model around `text` with history settings taken from `config`.
    pub fn from_config(name: &str, text: &str, config: &Config) -> Result<Self> {
        let mut doc = StyledBuffer::from_str(name, text)?;
        let end = doc.char_count();
        doc.place_cursor(end);
        let mut undo = UndoEngine::new(config.undo_levels());
        undo.set_low_memory(config.low_memory());
        // Construction-time events describe no user action.
        undo.drain_events();
        info!(target: "model", chars = end, levels = undo.max_depth(), low_memory = config.low_memory(), "model_created");
        Ok(Self::new(doc, undo))
    }

    pub fn doc(&self) -> &StyledBuffer {
        &self.doc
    }

    pub fn undo_engine(&self) -> &UndoEngine {
        &self.undo
    }

    pub fn undo_engine_mut(&mut self) -> &mut UndoEngine {
        &mut self.undo
    }

    pub fn is_rich_text(&self) -> bool {
        self.rich_text
    }

    pub fn last_line_justification(&self) -> Justification {
        self.last_line_justification
    }

    pub fn pending_style(&self) -> &BTreeSet<TagId> {
        &self.pending_style
    }

    /// Engine notifications (availability, memory) since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<UndoEvent> {
        std::mem::take(&mut self.notifications)
    }

    /// Insert at the cursor, replacing the selection if there is one.
    pub fn insert_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.undo.begin_transaction();
        self.delete_selection();
        let at = self.doc.cursor();
        self.undo.record_insert(at, text);
        let inserted = self.doc.insert(at, text);
        if self.rich_text {
            let style: Vec<TagId> = self.pending_style.iter().copied().collect();
            for tag in style {
                self.undo.record_tag_apply(inserted.clone(), tag, true);
                self.doc.apply_tag(tag, inserted.clone());
            }
        }
        self.undo.end_transaction();
        trace!(target: "model", offset = at, chars = inserted.len(), "insert_text");
        self.sync();
    }

    pub fn type_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.insert_text(c.encode_utf8(&mut buf));
    }

    pub fn backspace(&mut self) {
        self.undo.begin_transaction();
        if !self.delete_selection() {
            let at = self.doc.cursor();
            if at > 0 {
                self.delete(at - 1..at);
            }
        }
        self.undo.end_transaction();
        self.sync();
    }

    pub fn delete_forward(&mut self) {
        self.undo.begin_transaction();
        if !self.delete_selection() {
            let at = self.doc.cursor();
            if at < self.doc.char_count() {
                self.delete(at..at + 1);
            }
        }
        self.undo.end_transaction();
        self.sync();
    }

    /// Delete an explicit range as one action.
    pub fn delete_range(&mut self, range: Range<usize>) {
        self.undo.begin_transaction();
        self.delete(range);
        self.undo.end_transaction();
        self.sync();
    }

    /// Move the selection; `start == end` places the cursor.
    pub fn select(&mut self, start: usize, end: usize) {
        let len = self.doc.char_count();
        let (start, end) = (start.min(len), end.min(len));
        self.undo.record_selection(start.min(end)..start.max(end));
        self.doc.set_selection(start, end);
        self.sync();
    }

    /// Apply or remove a named tag over the selection. With no selection the
    /// change goes to the pending style for the next typed text.
    pub fn set_tag(&mut self, name: &str, on: bool) {
        if !self.rich_text {
            debug!(target: "model", "set_tag_in_plain_mode");
            return;
        }
        let tag = self.doc.tag(name);
        let (start, end) = self.doc.selection();
        if start == end {
            if on {
                self.pending_style.insert(tag);
            } else {
                self.pending_style.remove(&tag);
            }
            return;
        }
        self.undo.begin_transaction();
        self.undo.record_tag_change(&self.doc, start..end);
        self.undo.record_tag_apply(start..end, tag, on);
        if on {
            self.doc.apply_tag(tag, start..end);
        } else {
            self.doc.remove_tag(tag, start..end);
        }
        self.undo.end_transaction();
        self.sync();
    }

    /// Justify the paragraph holding the cursor. On the trailing empty line
    /// only the last-line justification value changes.
    pub fn set_justification(&mut self, justification: Justification) {
        if !self.rich_text {
            debug!(target: "model", "justify_in_plain_mode");
            return;
        }
        let range = self.paragraph_at(self.doc.cursor());
        let new_tag = self.doc.tag(justification_tag_name(justification));
        self.undo.begin_transaction();
        if range.is_empty() {
            let old = self.last_line_justification;
            if old != justification {
                self.undo.record_last_line_justify(old, justification);
                self.last_line_justification = justification;
            }
        } else {
            match self.justification_tag_at(range.start) {
                Some(prior) if prior == new_tag => {}
                Some(prior) => {
                    self.undo.record_justify_change(range.clone(), prior, Some(new_tag));
                    self.doc.remove_tag(prior, range.clone());
                    self.doc.apply_tag(new_tag, range);
                }
                None => {
                    self.undo.record_tag_change(&self.doc, range.clone());
                    self.undo.record_tag_apply(range.clone(), new_tag, true);
                    self.doc.apply_tag(new_tag, range);
                }
            }
        }
        self.undo.end_transaction();
        self.sync();
    }

    /// Switch between rich and plain text. Going plain strips every tag.
    pub fn set_rich_text(&mut self, rich_text: bool) {
        if rich_text == self.rich_text {
            return;
        }
        self.undo.begin_transaction();
        self.undo.record_format_mode_change(&self.doc, rich_text);
        if !rich_text {
            let all = 0..self.doc.char_count();
            self.doc.clear_all_tags(all);
            self.pending_style.clear();
        }
        self.rich_text = rich_text;
        self.undo.end_transaction();
        info!(target: "model", rich_text, "format_mode_changed");
        self.sync();
    }

    pub fn undo(&mut self) -> bool {
        let done = self.undo.undo(&mut self.doc);
        self.sync();
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.undo.redo(&mut self.doc);
        self.sync();
        done
    }

    /// Run a bulk edit that must not be undoable on its own.
    pub fn without_history<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut StyledBuffer),
    {
        self.undo.freeze();
        edit(&mut self.doc);
        self.undo.thaw();
    }

    fn delete(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        self.undo.record_delete(&self.doc, range.clone());
        self.doc.delete(range);
    }

    fn delete_selection(&mut self) -> bool {
        let (start, end) = self.doc.selection();
        if start == end {
            return false;
        }
        self.delete(start..end);
        true
    }

    /// Paragraph containing `offset`, including its newline.
    fn paragraph_at(&self, offset: usize) -> Range<usize> {
        self.doc.line_range_at(offset)
    }

    fn justification_tag_at(&self, offset: usize) -> Option<TagId> {
        let here = self.doc.tags_at(offset);
        JUSTIFICATIONS
            .iter()
            .filter_map(|j| self.doc.tags().lookup(justification_tag_name(*j)))
            .find(|tag| here.contains(tag))
    }

    /// Fold engine events into model state.
    fn sync(&mut self) {
        for event in self.undo.drain_events() {
            match event {
                UndoEvent::FormatChanged { rich_text } => {
                    self.rich_text = rich_text;
                    if !rich_text {
                        self.pending_style.clear();
                    }
                    info!(target: "model", rich_text, "format_mode_restored");
                }
                UndoEvent::LastLineJustify(j) => {
                    self.last_line_justification = j;
                }
                other => self.notifications.push(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(text: &str) -> RichTextModel {
        RichTextModel::from_config("t", text, &Config::default()).unwrap()
    }

    #[test]
    fn paragraph_bounds_include_newline() {
        let m = model("ab\ncd\n");
        assert_eq!(m.paragraph_at(1), 0..3);
        assert_eq!(m.paragraph_at(3), 3..6);
        assert_eq!(m.paragraph_at(6), 6..6);
    }

    #[test]
    fn typing_then_undo() {
        let mut m = model("");
        for c in "hi".chars() {
            m.type_char(c);
        }
        assert_eq!(m.doc().content(), "hi");
        assert!(m.undo());
        assert_eq!(m.doc().content(), "");
        assert!(m.redo());
        assert_eq!(m.doc().content(), "hi");
    }

    #[test]
    fn bulk_edit_is_not_recorded() {
        let mut m = model("");
        m.without_history(|doc| {
            doc.insert(0, "loaded");
        });
        assert_eq!(m.undo_engine().undo_depth(), 0);
        assert_eq!(m.doc().content(), "loaded");
    }
}
