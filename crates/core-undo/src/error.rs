use thiserror::Error;

/// Failures inside the engine. None of these escape the public recording API:
/// allocation failures degrade history, invariant violations abort the step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UndoError {
    #[error("undo history allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },
    #[error("undo invariant violated: {0}")]
    InvariantViolation(&'static str),
}
