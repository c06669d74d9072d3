//! Ledger error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the ledger layers.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// The failure taxonomy every operation surfaces.
///
/// Front controllers map these kinds to their protocol's status codes and
/// never expose raw store errors in their place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A request field failed validation (malformed type, negative quantity,
    /// empty required field). Detected before any store access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced product does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was well-formed but the current state forbids it
    /// (resulting stock would be negative, duplicate identifier).
    #[error("precondition failed: {0}")]
    FailedPrecondition(String),

    /// The concurrency-retry budget was exhausted. Safe for callers to retry.
    #[error("aborted: {0}")]
    Aborted(String),

    /// The ledger store timed out or refused the connection.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The store returned a shape the ledger could not interpret.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::Aborted(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine-readable kind, stable across releases.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            Self::Aborted(_) => ErrorKind::Aborted,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Wire-stable error kind. Both front controllers derive their status
/// mapping from this enum by exhaustive match.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Aborted,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::FailedPrecondition => "failed_precondition",
            Self::Aborted => "aborted",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
