//! Conflict detection and resolution for synced entities.
//!
//! [`ConflictDetector`] decides *whether* two snapshots diverge (version
//! counters first, timestamps as fallback); [`ConflictResolver`] decides
//! *who wins* by applying a [`ResolutionStrategy`]. Which strategy applies
//! by default is data, not code: see [`StrategyPolicy`] for the
//! per-resource-type table and its two built-in profiles.

mod detector;
mod policy;
mod resolver;
mod types;

pub use self::detector::{ConflictDetector, CLOCK_SKEW_TOLERANCE_MS};
pub use self::policy::{FieldRule, MergeOp, MergePolicy, StrategyPolicy};
pub use self::resolver::ConflictResolver;
pub use self::types::{
    ConflictError, ConflictResolution, ResolutionOutcome, ResolutionStrategy, ResourceType,
    SyncConflict,
};
