//! Rope-backed styled text buffer.

use ahash::AHashMap;
use anyhow::Result;
use ropey::Rope;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use tracing::trace;

use crate::spans::SpanSet;
use crate::{Document, TagId, TagToggle};

/// Name <-> id interning for tags created on a buffer.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    by_name: AHashMap<String, TagId>,
    names: Vec<String>,
}

impl TagTable {
    /// Return the id for `name`, creating it on first use.
    pub fn intern(&mut self, name: &str) -> TagId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = TagId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<TagId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: TagId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A text buffer backed by a `ropey::Rope` with per-tag coverage sets.
#[derive(Clone)]
pub struct StyledBuffer {
    rope: Rope,
    pub name: String,
    table: TagTable,
    coverage: BTreeMap<TagId, SpanSet>,
    anchor: usize,
    cursor: usize,
    atomic_depth: u32,
    changed_in_atomic: bool,
    change_notifications: u64,
}

impl StyledBuffer {
    /// Construct a buffer from an in-memory string slice. Cursor starts at the origin.
    pub fn from_str(name: impl Into<String>, content: &str) -> Result<Self> {
        Ok(Self {
            rope: Rope::from_str(content),
            name: name.into(),
            table: TagTable::default(),
            coverage: BTreeMap::new(),
            anchor: 0,
            cursor: 0,
            atomic_depth: 0,
            changed_in_atomic: false,
            change_notifications: 0,
        })
    }

    pub fn content(&self) -> String {
        self.rope.to_string()
    }

    pub fn tags(&self) -> &TagTable {
        &self.table
    }

    pub fn tag(&mut self, name: &str) -> TagId {
        self.table.intern(name)
    }

    /// Coverage of a single tag.
    pub fn spans(&self, tag: TagId) -> Vec<Range<usize>> {
        self.coverage
            .get(&tag)
            .map(|s| s.spans().to_vec())
            .unwrap_or_default()
    }

    /// Every `(tag, span)` pair, ordered by tag then offset.
    pub fn tag_spans(&self) -> Vec<(TagId, Range<usize>)> {
        self.coverage
            .iter()
            .flat_map(|(tag, set)| set.spans().iter().map(move |r| (*tag, r.clone())))
            .collect()
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Char range of the line holding `offset`, including its line break.
    /// Past a trailing newline this is the empty last line.
    pub fn line_range_at(&self, offset: usize) -> Range<usize> {
        let offset = offset.min(self.rope.len_chars());
        let line = self.rope.char_to_line(offset);
        let start = self.rope.line_to_char(line);
        start..start + self.rope.line(line).len_chars()
    }

    /// Number of change notifications observers would have received.
    pub fn change_notifications(&self) -> u64 {
        self.change_notifications
    }

    fn clamp(&self, range: Range<usize>) -> Range<usize> {
        let len = self.rope.len_chars();
        let start = range.start.min(len);
        let end = range.end.min(len).max(start);
        start..end
    }

    fn notify_changed(&mut self) {
        if self.atomic_depth > 0 {
            self.changed_in_atomic = true;
        } else {
            self.change_notifications += 1;
        }
    }

    fn prune(&mut self) {
        self.coverage.retain(|_, set| !set.is_empty());
    }
}

impl Document for StyledBuffer {
    fn char_count(&self) -> usize {
        self.rope.len_chars()
    }

    fn text(&self, range: Range<usize>) -> String {
        let r = self.clamp(range);
        self.rope.slice(r).to_string()
    }

    fn insert(&mut self, offset: usize, text: &str) -> Range<usize> {
        let offset = offset.min(self.rope.len_chars());
        let len = text.chars().count();
        if len == 0 {
            return offset..offset;
        }
        self.rope.insert(offset, text);
        for set in self.coverage.values_mut() {
            set.shift_for_insert(offset, len);
        }
        let shift = |p: usize| if p >= offset { p + len } else { p };
        self.anchor = shift(self.anchor);
        self.cursor = shift(self.cursor);
        trace!(target: "document", offset, len, "insert");
        self.notify_changed();
        offset..offset + len
    }

    fn delete(&mut self, range: Range<usize>) -> usize {
        let r = self.clamp(range);
        if r.is_empty() {
            return r.start;
        }
        self.rope.remove(r.clone());
        for set in self.coverage.values_mut() {
            set.shift_for_delete(r.clone());
        }
        self.prune();
        let collapse = |p: usize| {
            if p <= r.start {
                p
            } else if p >= r.end {
                p - r.len()
            } else {
                r.start
            }
        };
        self.anchor = collapse(self.anchor);
        self.cursor = collapse(self.cursor);
        trace!(target: "document", start = r.start, end = r.end, "delete");
        self.notify_changed();
        r.start
    }

    fn apply_tag(&mut self, tag: TagId, range: Range<usize>) {
        let r = self.clamp(range);
        if r.is_empty() {
            return;
        }
        self.coverage.entry(tag).or_default().add(r);
        self.notify_changed();
    }

    fn remove_tag(&mut self, tag: TagId, range: Range<usize>) {
        let r = self.clamp(range);
        if r.is_empty() {
            return;
        }
        if let Some(set) = self.coverage.get_mut(&tag) {
            set.remove(r);
        }
        self.prune();
        self.notify_changed();
    }

    fn clear_all_tags(&mut self, range: Range<usize>) {
        let r = self.clamp(range);
        if r.is_empty() {
            return;
        }
        for set in self.coverage.values_mut() {
            set.remove(r.clone());
        }
        self.prune();
        self.notify_changed();
    }

    fn tags_at(&self, offset: usize) -> BTreeSet<TagId> {
        self.coverage
            .iter()
            .filter(|(_, set)| set.contains(offset))
            .map(|(tag, _)| *tag)
            .collect()
    }

    fn tag_toggle_points(&self, range: Range<usize>) -> Vec<TagToggle> {
        let r = self.clamp(range);
        let mut out = Vec::new();
        for (tag, set) in &self.coverage {
            for span in set.spans() {
                if span.start >= r.start && span.start <= r.end {
                    out.push(TagToggle {
                        offset: span.start,
                        tag: *tag,
                        opening: true,
                    });
                }
                if span.end >= r.start && span.end <= r.end {
                    out.push(TagToggle {
                        offset: span.end,
                        tag: *tag,
                        opening: false,
                    });
                }
            }
        }
        out.sort_by_key(|t| (t.offset, t.opening, t.tag));
        out
    }

    fn selection(&self) -> (usize, usize) {
        (self.anchor.min(self.cursor), self.anchor.max(self.cursor))
    }

    fn set_selection(&mut self, start: usize, end: usize) {
        let len = self.rope.len_chars();
        self.anchor = start.min(len);
        self.cursor = end.min(len);
    }

    fn place_cursor(&mut self, offset: usize) {
        let offset = offset.min(self.rope.len_chars());
        self.anchor = offset;
        self.cursor = offset;
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn begin_atomic_edit(&mut self) {
        self.atomic_depth += 1;
    }

    fn end_atomic_edit(&mut self) {
        if self.atomic_depth == 0 {
            return;
        }
        self.atomic_depth -= 1;
        if self.atomic_depth == 0 && self.changed_in_atomic {
            self.changed_in_atomic = false;
            self.change_notifications += 1;
        }
    }
}
