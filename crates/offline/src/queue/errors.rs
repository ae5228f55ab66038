//! Queue operation errors.

use thiserror::Error;

use crate::failure::{FailureKind, SyncFailure};
use crate::store::StoreError;

/// Errors raised by the durable error queue.
///
/// Missing ids are deliberately *not* errors: `resolve_error` and
/// `increment_retry` treat an unknown id as a benign no-op, since "already
/// resolved or never queued" is an expected condition after garbage
/// collection.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue refused a new record because it is at capacity.
    #[error("error queue is at maximum capacity ({0})")]
    CapacityExceeded(usize),

    /// The persisted collection could not be deserialized.
    #[error("persisted error queue is corrupted: {0}")]
    Corrupted(String),

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The queue was constructed with invalid configuration.
    #[error("invalid queue configuration: {0}")]
    InvalidConfig(String),
}

/// Queue operation result type.
pub type QueueResult<T> = Result<T, QueueError>;

impl From<&QueueError> for FailureKind {
    fn from(err: &QueueError) -> Self {
        match err {
            QueueError::CapacityExceeded(_) => FailureKind::QueueFull,
            QueueError::Corrupted(_) | QueueError::Store(_) => FailureKind::DataCorruption,
            QueueError::InvalidConfig(_) => FailureKind::ClientError,
        }
    }
}

impl From<QueueError> for SyncFailure {
    fn from(err: QueueError) -> Self {
        let kind = FailureKind::from(&err);
        Self::tagged(kind, err.to_string())
    }
}
