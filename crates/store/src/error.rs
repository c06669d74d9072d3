//! Store operation errors.
//!
//! These are infrastructure failures (concurrency, connectivity, row shape),
//! kept separate from the ledger taxonomy. The engine owns the mapping into
//! caller-visible kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency check failed (version mismatch or concurrent
    /// append). Retryable.
    #[error("version conflict: {0}")]
    Conflict(String),

    /// The store could not be reached (pool closed, connection refused,
    /// network failure).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A row came back in a shape the typed accessors could not decode.
    #[error("malformed row: {0}")]
    Malformed(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
