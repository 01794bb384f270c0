//! Sorted, coalesced interval sets used for per-tag coverage.
//!
//! Invariant: spans are non-empty, sorted by start, and neither overlap nor
//! touch (touching spans are merged on every mutation).

use std::ops::Range;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanSet {
    spans: Vec<Range<usize>>,
}

impl SpanSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.spans
            .iter()
            .any(|s| s.start <= offset && offset < s.end)
    }

    pub fn add(&mut self, range: Range<usize>) {
        if range.start >= range.end {
            return;
        }
        let mut merged = range;
        let mut out = Vec::with_capacity(self.spans.len() + 1);
        let mut placed = false;
        for span in self.spans.drain(..) {
            if span.end < merged.start {
                out.push(span);
            } else if span.start > merged.end {
                if !placed {
                    out.push(merged.clone());
                    placed = true;
                }
                out.push(span);
            } else {
                merged.start = merged.start.min(span.start);
                merged.end = merged.end.max(span.end);
            }
        }
        if !placed {
            out.push(merged);
        }
        self.spans = out;
    }

    pub fn remove(&mut self, range: Range<usize>) {
        if range.start >= range.end {
            return;
        }
        let mut out = Vec::with_capacity(self.spans.len() + 1);
        for span in self.spans.drain(..) {
            if span.end <= range.start || span.start >= range.end {
                out.push(span);
                continue;
            }
            if span.start < range.start {
                out.push(span.start..range.start);
            }
            if span.end > range.end {
                out.push(range.end..span.end);
            }
        }
        self.spans = out;
    }

    /// Shift for `len` characters inserted at `offset`. A span containing the
    /// insertion point strictly inside is split around the new text.
    pub fn shift_for_insert(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let mut out = Vec::with_capacity(self.spans.len() + 1);
        for span in self.spans.drain(..) {
            if span.end <= offset {
                out.push(span);
            } else if span.start >= offset {
                out.push(span.start + len..span.end + len);
            } else {
                out.push(span.start..offset);
                out.push(offset + len..span.end + len);
            }
        }
        self.spans = out;
    }

    /// Collapse `range` out of the coordinate space.
    pub fn shift_for_delete(&mut self, range: Range<usize>) {
        if range.start >= range.end {
            return;
        }
        let map = |p: usize| {
            if p <= range.start {
                p
            } else if p >= range.end {
                p - (range.end - range.start)
            } else {
                range.start
            }
        };
        let old = std::mem::take(&mut self.spans);
        for span in old {
            let mapped = map(span.start)..map(span.end);
            if mapped.start < mapped.end {
                self.add(mapped);
            }
        }
    }
}
