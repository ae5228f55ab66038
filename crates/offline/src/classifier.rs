//! Failure classification: taxonomy tag, retryability verdict, and the
//! user-facing message table.
//!
//! Everything here is pure. Classification is deterministic given the
//! normalized [`SyncFailure`] input; there is no I/O and no clock access.

use crate::failure::{FailureKind, SyncFailure};

/// Message fragments that indicate the operation ran out of time.
///
/// Checked before the network phrases so "connection timed out" classifies
/// as a timeout rather than general unreachability.
const TIMEOUT_PHRASES: &[&str] =
    &["timeout", "timed out", "deadline exceeded", "took too long"];

/// Message fragments that indicate the device could not reach the network.
const NETWORK_PHRASES: &[&str] = &[
    "network request failed",
    "network error",
    "unable to resolve host",
    "connection refused",
    "connection reset",
    "no internet",
    "internet connection",
    "unreachable",
    "socket",
    "dns",
    "offline",
];

impl SyncFailure {
    /// Map the failure to its taxonomy tag.
    ///
    /// Transport failures are classified by case-insensitive phrase
    /// matching; anything unmatched is treated as `NetworkUnreachable`
    /// (a malformed connection error is still a connection error). HTTP
    /// failures map 4xx to `ClientError` and everything else to
    /// `ServerError`. Already-tagged failures are honored verbatim.
    pub fn classify(&self) -> FailureKind {
        match self {
            Self::Transport { message } => classify_transport_message(message),
            Self::Http { status, .. } => {
                if (400..500).contains(status) {
                    FailureKind::ClientError
                } else {
                    FailureKind::ServerError
                }
            }
            Self::Tagged { kind, .. } => *kind,
        }
    }

    /// Whether a retry has any chance of succeeding.
    ///
    /// Connectivity trouble, timeouts, and server-side failures are
    /// retryable. Client errors are not, with two exceptions: 408
    /// (request timeout) and 429 (rate limited), both of which are the
    /// server asking the client to try again.
    pub fn is_retryable(&self) -> bool {
        match self.classify() {
            FailureKind::NetworkUnreachable
            | FailureKind::Timeout
            | FailureKind::ServerError => true,
            FailureKind::ClientError => matches!(self.status(), Some(408 | 429)),
            FailureKind::SyncConflict
            | FailureKind::QueueFull
            | FailureKind::DataCorruption => false,
        }
    }

    /// Fixed user-facing message for the failure.
    ///
    /// Falls back to the raw message when no table entry applies, so the
    /// caller always has something displayable.
    pub fn friendly_message(&self) -> String {
        if let Some(status) = self.status() {
            if let Some(message) = status_message(status) {
                return message.to_string();
            }
        }

        match self.classify() {
            FailureKind::NetworkUnreachable | FailureKind::Timeout => {
                "You appear to be offline. Your changes are saved and will sync \
                 when you reconnect."
                    .to_string()
            }
            FailureKind::ServerError => {
                "Something went wrong on our end. Please try again in a moment.".to_string()
            }
            FailureKind::SyncConflict => {
                "Your changes conflict with a newer version. Review and try again.".to_string()
            }
            FailureKind::QueueFull => {
                "Too many pending changes. Reconnect to sync before making more.".to_string()
            }
            FailureKind::DataCorruption => {
                "Some locally saved data could not be read. It may need to be \
                 synced again."
                    .to_string()
            }
            FailureKind::ClientError => self.message().to_string(),
        }
    }
}

fn classify_transport_message(message: &str) -> FailureKind {
    let lowered = message.to_lowercase();

    if TIMEOUT_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return FailureKind::Timeout;
    }

    if NETWORK_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return FailureKind::NetworkUnreachable;
    }

    // Unclassified transport failures are treated as connectivity trouble,
    // which keeps them retryable.
    FailureKind::NetworkUnreachable
}

fn status_message(status: u16) -> Option<&'static str> {
    match status {
        401 => Some("Your session has expired. Please sign in again."),
        403 => Some("You don't have permission to do that."),
        404 => Some("We couldn't find what you were looking for."),
        409 => Some("Your changes conflict with a newer version. Review and try again."),
        500..=599 => Some("Something went wrong on our end. Please try again in a moment."),
        _ => None,
    }
}
