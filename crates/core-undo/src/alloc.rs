//! Fallible allocation for history records.
//!
//! Every new operation (and every payload that grows an existing one) is
//! reserved through a [`HistoryAllocator`] before it is built. The default
//! allocator always grants; the actual buffers are then allocated with
//! `try_reserve` so that a genuine out-of-memory condition takes the same
//! degradation path as an allocator refusal.

use crate::error::UndoError;

pub trait HistoryAllocator {
    /// Grant or refuse `bytes` of new history storage.
    fn reserve(&mut self, bytes: usize) -> Result<(), UndoError>;
}

/// Defers entirely to the global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl HistoryAllocator for SystemAllocator {
    fn reserve(&mut self, _bytes: usize) -> Result<(), UndoError> {
        Ok(())
    }
}

/// Copy `text` into a freshly allocated `String`.
pub(crate) fn copy_text(text: &str) -> Result<String, UndoError> {
    let mut out = String::new();
    out.try_reserve_exact(text.len())
        .map_err(|_| UndoError::AllocationFailed { bytes: text.len() })?;
    out.push_str(text);
    Ok(out)
}

/// Make room for `additional` more elements in `v`.
pub(crate) fn grow<T>(v: &mut Vec<T>, additional: usize) -> Result<(), UndoError> {
    v.try_reserve(additional)
        .map_err(|_| UndoError::AllocationFailed {
            bytes: additional.saturating_mul(std::mem::size_of::<T>()),
        })
}
