//! Queued error records and queue configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::failure::FailureKind;

/// Default storage key holding the serialized collection.
pub const DEFAULT_STORAGE_KEY: &str = "error_queue.v1";

/// Default maximum number of records (resolved included) the queue holds.
pub const DEFAULT_MAX_CAPACITY: usize = 500;

/// A previously-failed operation awaiting visibility or retry.
///
/// `id` and `created_at` are assigned at creation and never change.
/// `retry_count` only ever grows, and `resolved` never reverts to false
/// once set; the queue's API enforces both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedError {
    pub id: Uuid,
    pub kind: FailureKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub resolved: bool,
}

impl QueuedError {
    /// Create a new unresolved record.
    pub fn new(
        kind: FailureKind,
        message: impl Into<String>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            created_at: Utc::now(),
            retry_count: 0,
            payload,
            resolved: false,
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Storage key the whole collection is persisted under.
    pub storage_key: String,
    /// Maximum number of records, resolved included; `add_error` rejects
    /// beyond this with a queue-full failure.
    pub max_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

impl QueueConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.storage_key.is_empty() {
            return Err("Storage key must not be empty".to_string());
        }

        if self.max_capacity == 0 {
            return Err("Max capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for queue types.
    use super::*;

    #[test]
    fn test_new_record_starts_unresolved() {
        let record = QueuedError::new(FailureKind::Timeout, "save timed out", None);

        assert_eq!(record.kind, FailureKind::Timeout);
        assert_eq!(record.retry_count, 0);
        assert!(!record.resolved);
        assert!(record.payload.is_none());
    }

    /// The persisted representation is a camelCase JSON object so the
    /// blob matches what the device store already contains.
    #[test]
    fn test_record_serializes_camel_case() {
        let record = QueuedError::new(
            FailureKind::ServerError,
            "save failed",
            Some(serde_json::json!({ "workoutId": "w-42" })),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("retryCount").is_some());
        assert_eq!(json["payload"]["workoutId"], "w-42");

        let back: QueuedError = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_config_validation() {
        assert!(QueueConfig::default().validate().is_ok());

        let config = QueueConfig { max_capacity: 0, ..QueueConfig::default() };
        assert!(config.validate().unwrap_err().contains("Max capacity"));

        let config = QueueConfig { storage_key: String::new(), ..QueueConfig::default() };
        assert!(config.validate().unwrap_err().contains("Storage key"));
    }
}
