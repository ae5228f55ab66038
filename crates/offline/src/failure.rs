//! Failure taxonomy and the normalized failure type.
//!
//! Raw errors arrive from the transport layer in several shapes: thrown
//! connection errors with only a message, structured responses carrying an
//! HTTP status, and failures that were already typed by an upstream
//! component (a detected sync conflict, a full queue). Every call site
//! normalizes into [`SyncFailure`] before anything downstream looks at it,
//! so classification never branches on duck-typed shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed taxonomy of failure tags.
///
/// `QueueFull` and `DataCorruption` are raised by this crate's own
/// components rather than produced by classification of transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Device cannot reach the network at all.
    NetworkUnreachable,
    /// The operation started but did not complete in time.
    Timeout,
    /// The server rejected the request (4xx).
    ClientError,
    /// The server failed to process the request (5xx).
    ServerError,
    /// A local/remote divergence was detected for the same entity.
    SyncConflict,
    /// The durable error queue refused a new record.
    QueueFull,
    /// Persisted data could not be read back intact.
    DataCorruption,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NetworkUnreachable => "NetworkUnreachable",
            Self::Timeout => "Timeout",
            Self::ClientError => "ClientError",
            Self::ServerError => "ServerError",
            Self::SyncConflict => "SyncConflict",
            Self::QueueFull => "QueueFull",
            Self::DataCorruption => "DataCorruption",
        };
        write!(f, "{name}")
    }
}

/// Normalized failure value consumed by the classifier and retry executor.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncFailure {
    /// Connection-level failure where only a message is known.
    #[error("{message}")]
    Transport { message: String },

    /// Structured failure carrying an HTTP status code.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Failure already typed by an upstream component; the tag is honored
    /// verbatim by classification.
    #[error("{message}")]
    Tagged { kind: FailureKind, message: String },
}

impl SyncFailure {
    /// Connection-level failure with only a message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Structured HTTP failure.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    /// Already-typed failure; `kind` is honored verbatim.
    pub fn tagged(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Tagged { kind, message: message.into() }
    }

    /// The failure used when the connectivity probe reports offline.
    pub fn offline() -> Self {
        Self::tagged(FailureKind::NetworkUnreachable, "device is offline")
    }

    /// A detected sync conflict surfaced as a failure.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::tagged(FailureKind::SyncConflict, message)
    }

    /// The raw human-readable message carried by the failure.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message }
            | Self::Http { message, .. }
            | Self::Tagged { message, .. } => message,
        }
    }

    /// The HTTP status, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
