//! Offline resilience layer for the Strideline mobile clients.
//!
//! Mobile sync fails constantly and recoverably: radios drop, servers
//! hiccup, two devices edit the same workout. This crate turns those
//! failures into explicit values and policies instead of scattered
//! catch-blocks:
//!
//! - [`failure`]: a closed taxonomy ([`FailureKind`]) and the normalized
//!   [`SyncFailure`] every raw error becomes before anything inspects it;
//! - [`classifier`]: tagging, retryability, and user-facing messages as
//!   pure functions of a failure;
//! - [`retry`]: [`RetryExecutor`] with capped exponential backoff, jitter,
//!   cooperative cancellation, and an optional connectivity gate;
//! - [`queue`]: [`ErrorQueue`], a durable restart-safe backlog of failed
//!   operations;
//! - [`conflict`]: divergence detection and strategy-driven resolution for
//!   entities edited on more than one device;
//! - [`context`]: [`OfflineContext`], the one explicitly-wired object that
//!   holds all of the above.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod classifier;
pub mod conflict;
pub mod context;
pub mod failure;
pub mod probe;
pub mod queue;
pub mod retry;
pub mod store;

pub use conflict::{
    ConflictDetector, ConflictError, ConflictResolution, ConflictResolver, MergePolicy,
    ResolutionOutcome, ResolutionStrategy, ResourceType, StrategyPolicy, SyncConflict,
};
pub use context::{OfflineContext, OfflineContextBuilder};
pub use failure::{FailureKind, SyncFailure};
pub use probe::{ConnectivityProbe, FlagProbe};
pub use queue::{ErrorQueue, QueueConfig, QueueError, QueuedError};
pub use retry::RetryExecutor;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
