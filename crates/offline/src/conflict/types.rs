//! Conflict records, strategies, and resolution outcomes.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of synced entity a conflict concerns ("workout", "dashboard", ...).
///
/// Open-ended rather than a closed enum: resolution policy is looked up by
/// resource type, and callers can register rules for types this crate has
/// never heard of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn workout() -> Self {
        Self::new("workout")
    }

    pub fn dashboard() -> Self {
        Self::new("dashboard")
    }

    pub fn achievement() -> Self {
        Self::new("achievement")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a detected conflict should be settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionStrategy {
    /// The remote version replaces the local one wholesale.
    ServerWins,
    /// The local version replaces the remote one wholesale.
    ClientWins,
    /// The version with the later `updatedAt` timestamp wins; ties go to
    /// the remote version.
    NewestWins,
    /// Field-level merge driven by per-resource-type rules.
    FieldMerge,
    /// No automatic resolution; the conflict is surfaced for a human.
    Manual,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ServerWins => "server-wins",
            Self::ClientWins => "client-wins",
            Self::NewestWins => "newest-wins",
            Self::FieldMerge => "field-merge",
            Self::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// A detected divergence between a local and a remote entity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub id: Uuid,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub local_version: serde_json::Value,
    pub remote_version: serde_json::Value,
    pub detected_at: DateTime<Utc>,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_strategy: Option<ResolutionStrategy>,
}

impl SyncConflict {
    pub fn new(
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        local_version: serde_json::Value,
        remote_version: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_type,
            resource_id: resource_id.into(),
            local_version,
            remote_version,
            detected_at: Utc::now(),
            resolved: false,
            resolution_strategy: None,
        }
    }

    /// Record which strategy settled this conflict.
    pub fn mark_resolved(&mut self, strategy: ResolutionStrategy) {
        self.resolved = true;
        self.resolution_strategy = Some(strategy);
    }
}

/// What a resolution attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// A winning (or merged) entity snapshot. `merged_fields` names the
    /// fields a field-merge touched; empty for wholesale strategies.
    Resolved {
        entity: serde_json::Value,
        merged_fields: BTreeSet<String>,
    },
    /// The conflict needs a human decision; carries the conflict back
    /// unresolved so it can be surfaced.
    Deferred(SyncConflict),
}

/// A settled (or deferred) conflict together with how and when.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictResolution {
    pub strategy: ResolutionStrategy,
    pub outcome: ResolutionOutcome,
    pub resolved_at: DateTime<Utc>,
}

/// Errors raised while inspecting entity snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// Neither `updatedAt` nor `createdAt` was present on the snapshot,
    /// and no version field was available to compare instead.
    #[error("{side} version has no usable timestamp")]
    MissingTimestamp { side: &'static str },

    /// A timestamp field was present but not parseable.
    #[error("{side} version has unparseable timestamp: {raw}")]
    InvalidTimestamp { side: &'static str, raw: String },

    /// A snapshot that must be a JSON object was something else.
    #[error("{side} version is not a JSON object")]
    NotAnObject { side: &'static str },
}
