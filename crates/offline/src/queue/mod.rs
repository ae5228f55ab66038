//! Durable error queue.
//!
//! Failed operations are captured as [`QueuedError`] records and persisted
//! as a whole collection under one storage key, so the backlog survives
//! process restarts. A single async mutex serializes mutations; see
//! [`ErrorQueue`] for the persistence-before-commit contract.

mod core;
mod errors;
mod types;

pub use self::core::ErrorQueue;
pub use self::errors::{QueueError, QueueResult};
pub use self::types::{QueueConfig, QueuedError, DEFAULT_MAX_CAPACITY, DEFAULT_STORAGE_KEY};
