//! Domain error types

use thiserror::Error;

/// Domain-level errors raised while validating externally supplied history
/// snapshots. In-process mutation maintains the history invariants by
/// construction and never produces these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A restored history snapshot contained no entries.
    #[error("token history snapshot is empty")]
    EmptyHistory,

    /// Entries were not in non-decreasing start-time order.
    #[error("token history out of chronological order at index {0}")]
    OutOfOrder(usize),

    /// An entry without a start time appeared somewhere other than first.
    #[error("entry without a start time at index {0}; only the oldest entry may omit one")]
    MisplacedOpenStart(usize),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
