//! Conflict detection between local and remote entity snapshots.

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use super::types::{ConflictError, ResourceType, SyncConflict};

/// Timestamp divergence below this is treated as device clock skew, not a
/// real edit conflict.
pub const CLOCK_SKEW_TOLERANCE_MS: i64 = 1000;

/// Detects divergence between two snapshots of the same entity.
///
/// Version counters are authoritative when both sides carry one; the
/// timestamp comparison is the fallback for entities that are not
/// version-tracked.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        Self
    }

    /// Compare snapshots and return a conflict record if they diverge.
    ///
    /// Returns `Ok(None)` when the snapshots agree (equal versions, or
    /// timestamps within [`CLOCK_SKEW_TOLERANCE_MS`] of each other).
    pub fn detect(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        local: &serde_json::Value,
        remote: &serde_json::Value,
    ) -> Result<Option<SyncConflict>, ConflictError> {
        if let (Some(local_version), Some(remote_version)) =
            (version_of(local), version_of(remote))
        {
            if local_version == remote_version {
                return Ok(None);
            }

            debug!(
                %resource_type,
                resource_id,
                local_version,
                remote_version,
                "Version divergence detected"
            );
            return Ok(Some(SyncConflict::new(
                resource_type,
                resource_id,
                local.clone(),
                remote.clone(),
            )));
        }

        let local_ts = timestamp_of(local, "local")?;
        let remote_ts = timestamp_of(remote, "remote")?;
        let skew_ms = (local_ts - remote_ts).num_milliseconds().abs();

        if skew_ms <= CLOCK_SKEW_TOLERANCE_MS {
            return Ok(None);
        }

        debug!(%resource_type, resource_id, skew_ms, "Timestamp divergence detected");
        Ok(Some(SyncConflict::new(
            resource_type,
            resource_id,
            local.clone(),
            remote.clone(),
        )))
    }
}

/// Version counter of a snapshot, if it carries one.
pub(crate) fn version_of(entity: &serde_json::Value) -> Option<i64> {
    entity.get("version").and_then(serde_json::Value::as_i64)
}

/// Last-modified timestamp of a snapshot: `updatedAt`, falling back to
/// `createdAt`. Accepts RFC 3339 strings or epoch-millisecond numbers.
pub(crate) fn timestamp_of(
    entity: &serde_json::Value,
    side: &'static str,
) -> Result<DateTime<Utc>, ConflictError> {
    let raw = entity
        .get("updatedAt")
        .or_else(|| entity.get("createdAt"))
        .ok_or(ConflictError::MissingTimestamp { side })?;

    match raw {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ConflictError::InvalidTimestamp { side, raw: s.clone() }),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .ok_or_else(|| ConflictError::InvalidTimestamp { side, raw: n.to_string() }),
        other => Err(ConflictError::InvalidTimestamp { side, raw: other.to_string() }),
    }
}
