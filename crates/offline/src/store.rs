//! Persisted key-value storage capability.
//!
//! The error queue consumes storage as a capability (get/set/remove by
//! key) rather than owning a database. [`MemoryStore`] backs tests and
//! short-lived processes; [`FileStore`] persists one file per key with an
//! atomic temp-file + rename write so a crash mid-write never leaves a
//! half-written blob behind.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage capability errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failed for the given key.
    #[error("storage {operation} failed for key '{key}': {source}")]
    Io {
        operation: &'static str,
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(operation: &'static str, key: &str, source: std::io::Error) -> Self {
        Self::Io { operation, key: key.to_string(), source }
    }
}

/// Async get/set/remove by key.
///
/// Implementations must treat an absent key as `Ok(None)`, never as an
/// error; the queue relies on that to bootstrap an empty collection.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the value stored under `key`; absent keys are a no-op.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// File-backed store: one file per key under a base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Keys may contain separators ('.', '/'); escape every byte that is
    /// not filename-safe as `_XX` (hex). Escaping '_' itself keeps the
    /// mapping injective, so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut safe = String::with_capacity(key.len());
        for byte in key.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' => safe.push(byte as char),
                other => safe.push_str(&format!("_{other:02x}")),
            }
        }
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);

        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io("read", key, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let temp_path = path.with_extension("tmp");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| StoreError::io("write", key, e))?;
        }

        // Write to a temporary file first for atomicity.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await
            .map_err(|e| StoreError::io("write", key, e))?;

        file.write_all(value.as_bytes()).await.map_err(|e| StoreError::io("write", key, e))?;
        file.sync_all().await.map_err(|e| StoreError::io("write", key, e))?;
        drop(file);

        fs::rename(&temp_path, &path).await.map_err(|e| StoreError::io("write", key, e))?;

        debug!(key, bytes = value.len(), "Persisted value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("remove", key, e)),
        }
    }
}
