//! Durable, restart-safe error queue.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::{QueueError, QueueResult};
use super::types::{QueueConfig, QueuedError};
use crate::failure::FailureKind;
use crate::store::KeyValueStore;

struct QueueState {
    entries: Vec<QueuedError>,
    loaded: bool,
}

/// Durable collection of previously-failed operations.
///
/// The whole collection is persisted as one JSON array under a single
/// storage key; an absent key bootstraps an empty queue. Every mutating
/// operation runs under one async mutex that owns the in-memory
/// collection, so overlapping callers serialize instead of racing the
/// read-modify-write cycle.
///
/// Persistence happens *before* the in-memory state is committed: when a
/// storage write fails the operation errors out and memory is untouched,
/// so the persisted and in-memory representations are equal whenever an
/// operation returns.
pub struct ErrorQueue {
    store: Arc<dyn KeyValueStore>,
    config: QueueConfig,
    state: Mutex<QueueState>,
}

impl ErrorQueue {
    /// Create a queue over the given store with default configuration.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        // The default config is statically valid.
        Self {
            store,
            config: QueueConfig::default(),
            state: Mutex::new(QueueState { entries: Vec::new(), loaded: false }),
        }
    }

    /// Create a queue with custom configuration.
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: QueueConfig) -> QueueResult<Self> {
        config.validate().map_err(QueueError::InvalidConfig)?;

        Ok(Self {
            store,
            config,
            state: Mutex::new(QueueState { entries: Vec::new(), loaded: false }),
        })
    }

    /// Load the persisted collection into memory.
    ///
    /// Idempotent: the load happens at most once per queue instance;
    /// repeat calls return immediately. Operations that touch the
    /// collection also load lazily, so calling this up front is optional
    /// but lets startup code surface corruption early.
    pub async fn initialize(&self) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        self.load_if_needed(&mut state).await
    }

    /// Append a new unresolved record and persist; returns its id.
    pub async fn add_error(
        &self,
        kind: FailureKind,
        message: impl Into<String>,
        payload: Option<serde_json::Value>,
    ) -> QueueResult<Uuid> {
        let mut state = self.state.lock().await;
        self.load_if_needed(&mut state).await?;

        if state.entries.len() >= self.config.max_capacity {
            warn!(capacity = self.config.max_capacity, "Error queue at capacity, rejecting");
            return Err(QueueError::CapacityExceeded(self.config.max_capacity));
        }

        let record = QueuedError::new(kind, message, payload);
        let id = record.id;

        let mut next = state.entries.clone();
        next.push(record);
        self.persist(&next).await?;
        state.entries = next;

        debug!(%id, %kind, size = state.entries.len(), "Queued failed operation");
        Ok(id)
    }

    /// All records that have not been marked resolved.
    pub async fn unresolved_errors(&self) -> QueueResult<Vec<QueuedError>> {
        let mut state = self.state.lock().await;
        self.load_if_needed(&mut state).await?;

        Ok(state.entries.iter().filter(|e| !e.resolved).cloned().collect())
    }

    /// Mark the record resolved; a no-op when the id is absent or the
    /// record is already resolved. Resolution never reverts.
    pub async fn resolve_error(&self, id: Uuid) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        self.load_if_needed(&mut state).await?;

        let Some(index) = state.entries.iter().position(|e| e.id == id && !e.resolved) else {
            debug!(%id, "Resolve skipped: id absent or already resolved");
            return Ok(());
        };

        let mut next = state.entries.clone();
        next[index].resolved = true;
        self.persist(&next).await?;
        state.entries = next;

        debug!(%id, "Marked error resolved");
        Ok(())
    }

    /// Increment the record's retry counter and persist; returns the new
    /// count, or 0 as a no-op when the id is absent.
    pub async fn increment_retry(&self, id: Uuid) -> QueueResult<u32> {
        let mut state = self.state.lock().await;
        self.load_if_needed(&mut state).await?;

        let Some(index) = state.entries.iter().position(|e| e.id == id) else {
            debug!(%id, "Retry increment skipped: id absent");
            return Ok(0);
        };

        let mut next = state.entries.clone();
        next[index].retry_count += 1;
        let new_count = next[index].retry_count;
        self.persist(&next).await?;
        state.entries = next;

        debug!(%id, retry_count = new_count, "Incremented retry count");
        Ok(new_count)
    }

    /// Garbage-collect: drop every resolved record. Returns the number
    /// removed.
    pub async fn clear_resolved(&self) -> QueueResult<usize> {
        let mut state = self.state.lock().await;
        self.load_if_needed(&mut state).await?;

        let next: Vec<QueuedError> =
            state.entries.iter().filter(|e| !e.resolved).cloned().collect();
        let removed = state.entries.len() - next.len();

        if removed > 0 {
            self.persist(&next).await?;
            state.entries = next;
            info!(removed, "Cleared resolved errors");
        }

        Ok(removed)
    }

    /// Drop every record. Returns the number removed.
    pub async fn clear_all(&self) -> QueueResult<usize> {
        let mut state = self.state.lock().await;
        self.load_if_needed(&mut state).await?;

        let removed = state.entries.len();
        self.persist(&[]).await?;
        state.entries.clear();

        info!(removed, "Cleared error queue");
        Ok(removed)
    }

    /// Number of records currently held, resolved included.
    pub async fn len(&self) -> QueueResult<usize> {
        let mut state = self.state.lock().await;
        self.load_if_needed(&mut state).await?;
        Ok(state.entries.len())
    }

    /// Whether the queue holds no records at all.
    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }

    async fn load_if_needed(&self, state: &mut QueueState) -> QueueResult<()> {
        if state.loaded {
            return Ok(());
        }

        let entries = match self.store.get(&self.config.storage_key).await? {
            Some(blob) => serde_json::from_str::<Vec<QueuedError>>(&blob)
                .map_err(|e| QueueError::Corrupted(e.to_string()))?,
            None => Vec::new(),
        };

        info!(count = entries.len(), key = %self.config.storage_key, "Loaded error queue");
        state.entries = entries;
        state.loaded = true;
        Ok(())
    }

    async fn persist(&self, entries: &[QueuedError]) -> QueueResult<()> {
        let blob = serde_json::to_string(entries)
            .map_err(|e| QueueError::Corrupted(e.to_string()))?;
        self.store.set(&self.config.storage_key, &blob).await?;
        Ok(())
    }
}
