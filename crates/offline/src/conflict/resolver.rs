//! Strategy application for detected conflicts.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, info};

use super::detector::timestamp_of;
use super::policy::MergePolicy;
use super::types::{
    ConflictError, ConflictResolution, ResolutionOutcome, ResolutionStrategy, SyncConflict,
};

/// Applies a [`ResolutionStrategy`] to a conflict, producing either a
/// winning entity snapshot or a deferred conflict for manual handling.
///
/// The resolver is pure over its inputs: it never mutates the caller's
/// conflict and never talks to storage. Persisting the outcome is the
/// caller's job.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    merge_policy: MergePolicy,
}

impl ConflictResolver {
    pub fn new(merge_policy: MergePolicy) -> Self {
        Self { merge_policy }
    }

    /// Settle the conflict with the given strategy.
    pub fn resolve(
        &self,
        conflict: &SyncConflict,
        strategy: ResolutionStrategy,
    ) -> Result<ConflictResolution, ConflictError> {
        let outcome = match strategy {
            ResolutionStrategy::ServerWins => wholesale(conflict.remote_version.clone()),
            ResolutionStrategy::ClientWins => wholesale(conflict.local_version.clone()),
            ResolutionStrategy::NewestWins => {
                let local_ts = timestamp_of(&conflict.local_version, "local")?;
                let remote_ts = timestamp_of(&conflict.remote_version, "remote")?;

                // Ties go to the remote version.
                if local_ts > remote_ts {
                    wholesale(conflict.local_version.clone())
                } else {
                    wholesale(conflict.remote_version.clone())
                }
            }
            ResolutionStrategy::FieldMerge => {
                let (entity, merged_fields) = self.merge_policy.apply(conflict)?;
                ResolutionOutcome::Resolved { entity, merged_fields }
            }
            ResolutionStrategy::Manual => {
                info!(
                    conflict_id = %conflict.id,
                    resource_type = %conflict.resource_type,
                    resource_id = %conflict.resource_id,
                    "Conflict deferred for manual resolution"
                );
                ResolutionOutcome::Deferred(conflict.clone())
            }
        };

        if !matches!(outcome, ResolutionOutcome::Deferred(_)) {
            debug!(
                conflict_id = %conflict.id,
                %strategy,
                resource_id = %conflict.resource_id,
                "Resolved conflict"
            );
        }

        Ok(ConflictResolution { strategy, outcome, resolved_at: Utc::now() })
    }
}

fn wholesale(entity: serde_json::Value) -> ResolutionOutcome {
    ResolutionOutcome::Resolved { entity, merged_fields: BTreeSet::new() }
}
