//! Per-resource-type resolution policy tables.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ConflictError, ResolutionStrategy, ResourceType, SyncConflict};

/// A field-level merge operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeOp {
    /// Both sides hold differing non-empty text: keep both, local first,
    /// separated by a newline. Local-only text is taken as-is.
    ConcatText,
    /// Take the local number when the remote side is null or absent.
    PreferLocalNumber,
    /// Take the local object when the remote side is null or absent.
    PreferLocalObject,
}

/// One merge rule: which field, and how to merge it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    pub op: MergeOp,
}

impl FieldRule {
    pub fn new(field: impl Into<String>, op: MergeOp) -> Self {
        Self { field: field.into(), op }
    }
}

/// Field-merge rules keyed by resource type.
///
/// The merged entity starts from the remote snapshot; each rule may then
/// pull local data into it. A resource type with no registered rules
/// merges to the remote snapshot unchanged.
#[derive(Debug, Clone, Default)]
pub struct MergePolicy {
    rules: HashMap<ResourceType, Vec<FieldRule>>,
}

impl MergePolicy {
    /// Empty policy: every field-merge degenerates to the remote snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register the rules for a resource type, replacing any existing set.
    pub fn set_rules(&mut self, resource_type: ResourceType, rules: Vec<FieldRule>) {
        self.rules.insert(resource_type, rules);
    }

    pub fn rules_for(&self, resource_type: &ResourceType) -> &[FieldRule] {
        self.rules.get(resource_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Merge the conflict's snapshots field by field.
    ///
    /// Returns the merged entity and the names of the fields where local
    /// data was pulled in.
    pub fn apply(
        &self,
        conflict: &SyncConflict,
    ) -> Result<(serde_json::Value, BTreeSet<String>), ConflictError> {
        let local = conflict
            .local_version
            .as_object()
            .ok_or(ConflictError::NotAnObject { side: "local" })?;
        let remote = conflict
            .remote_version
            .as_object()
            .ok_or(ConflictError::NotAnObject { side: "remote" })?;

        let mut merged = remote.clone();
        let mut merged_fields = BTreeSet::new();

        for rule in self.rules_for(&conflict.resource_type) {
            let local_value = local.get(&rule.field);
            let remote_value = remote.get(&rule.field);

            if let Some(value) = merge_field(rule.op, local_value, remote_value) {
                merged.insert(rule.field.clone(), value);
                merged_fields.insert(rule.field.clone());
            }
        }

        debug!(
            resource_type = %conflict.resource_type,
            resource_id = %conflict.resource_id,
            merged = merged_fields.len(),
            "Applied field merge"
        );
        Ok((serde_json::Value::Object(merged), merged_fields))
    }
}

/// Resolve one field; `None` means the remote value stands.
fn merge_field(
    op: MergeOp,
    local: Option<&serde_json::Value>,
    remote: Option<&serde_json::Value>,
) -> Option<serde_json::Value> {
    match op {
        MergeOp::ConcatText => {
            let local_text = local.and_then(serde_json::Value::as_str).filter(|s| !s.is_empty());
            let remote_text = remote.and_then(serde_json::Value::as_str).filter(|s| !s.is_empty());

            match (local_text, remote_text) {
                (Some(l), Some(r)) if l != r => Some(serde_json::json!(format!("{l}\n{r}"))),
                (Some(l), None) => Some(serde_json::json!(l)),
                _ => None,
            }
        }
        MergeOp::PreferLocalNumber => {
            let remote_missing = remote.map_or(true, serde_json::Value::is_null);
            match local {
                Some(value) if value.is_number() && remote_missing => Some(value.clone()),
                _ => None,
            }
        }
        MergeOp::PreferLocalObject => {
            let remote_missing = remote.map_or(true, serde_json::Value::is_null);
            match local {
                Some(value) if value.is_object() && remote_missing => Some(value.clone()),
                _ => None,
            }
        }
    }
}

/// Default merge rules for the fitness entities.
impl MergePolicy {
    pub fn fitness_defaults() -> Self {
        let mut policy = Self::default();
        policy.set_rules(
            ResourceType::workout(),
            vec![
                FieldRule::new("notes", MergeOp::ConcatText),
                FieldRule::new("caloriesBurned", MergeOp::PreferLocalNumber),
                FieldRule::new("distanceKm", MergeOp::PreferLocalNumber),
                FieldRule::new("route", MergeOp::PreferLocalObject),
            ],
        );
        policy.set_rules(
            ResourceType::dashboard(),
            vec![FieldRule::new("layout", MergeOp::PreferLocalObject)],
        );
        policy.set_rules(
            ResourceType::achievement(),
            vec![FieldRule::new("note", MergeOp::ConcatText)],
        );
        policy
    }
}

/// Default-strategy table keyed by resource type.
///
/// Two built-in profiles exist because the product genuinely wants both:
/// background sync should merge workout edits quietly
/// ([`StrategyPolicy::background_sync`]), while an explicit in-app save
/// should honor what the user just typed
/// ([`StrategyPolicy::interactive_save`]). Pick the profile per flow; the
/// table makes the disagreement visible instead of burying one default
/// inside the resolver.
#[derive(Debug, Clone)]
pub struct StrategyPolicy {
    defaults: HashMap<ResourceType, ResolutionStrategy>,
    fallback: ResolutionStrategy,
}

impl StrategyPolicy {
    /// Profile for unattended background sync: workout conflicts
    /// field-merge so neither side's data is silently dropped.
    pub fn background_sync() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(ResourceType::workout(), ResolutionStrategy::FieldMerge);
        defaults.insert(ResourceType::dashboard(), ResolutionStrategy::NewestWins);
        defaults.insert(ResourceType::achievement(), ResolutionStrategy::ServerWins);

        Self { defaults, fallback: ResolutionStrategy::NewestWins }
    }

    /// Profile for an explicit user-initiated save: the workout the user
    /// just edited wins outright.
    pub fn interactive_save() -> Self {
        let mut policy = Self::background_sync();
        policy.set_default(ResourceType::workout(), ResolutionStrategy::ClientWins);
        policy
    }

    /// Default strategy for a resource type, or the fallback.
    pub fn default_strategy(&self, resource_type: &ResourceType) -> ResolutionStrategy {
        self.defaults.get(resource_type).copied().unwrap_or(self.fallback)
    }

    /// Override the default for one resource type.
    pub fn set_default(&mut self, resource_type: ResourceType, strategy: ResolutionStrategy) {
        self.defaults.insert(resource_type, strategy);
    }

    pub fn fallback(&self) -> ResolutionStrategy {
        self.fallback
    }

    pub fn set_fallback(&mut self, strategy: ResolutionStrategy) {
        self.fallback = strategy;
    }
}

impl Default for StrategyPolicy {
    fn default() -> Self {
        Self::background_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workout_conflict(
        local: serde_json::Value,
        remote: serde_json::Value,
    ) -> SyncConflict {
        SyncConflict::new(ResourceType::workout(), "w-1", local, remote)
    }

    #[test]
    fn test_concat_text_keeps_both_sides_local_first() {
        let conflict = workout_conflict(
            serde_json::json!({ "notes": "felt great" }),
            serde_json::json!({ "notes": "coach: good pace" }),
        );

        let (entity, merged) = MergePolicy::fitness_defaults().apply(&conflict).unwrap();

        assert_eq!(entity["notes"], "felt great\ncoach: good pace");
        assert!(merged.contains("notes"));
    }

    #[test]
    fn test_concat_text_identical_keeps_remote_untouched() {
        let conflict = workout_conflict(
            serde_json::json!({ "notes": "same" }),
            serde_json::json!({ "notes": "same" }),
        );

        let (entity, merged) = MergePolicy::fitness_defaults().apply(&conflict).unwrap();

        assert_eq!(entity["notes"], "same");
        assert!(merged.is_empty());
    }

    #[test]
    fn test_local_only_text_is_taken() {
        let conflict = workout_conflict(
            serde_json::json!({ "notes": "only I wrote this" }),
            serde_json::json!({}),
        );

        let (entity, merged) = MergePolicy::fitness_defaults().apply(&conflict).unwrap();

        assert_eq!(entity["notes"], "only I wrote this");
        assert!(merged.contains("notes"));
    }

    #[test]
    fn test_prefer_local_number_only_fills_gaps() {
        let conflict = workout_conflict(
            serde_json::json!({ "caloriesBurned": 320, "distanceKm": 5.2 }),
            serde_json::json!({ "caloriesBurned": null, "distanceKm": 5.5 }),
        );

        let (entity, merged) = MergePolicy::fitness_defaults().apply(&conflict).unwrap();

        // Gap filled from local; present remote value stands.
        assert_eq!(entity["caloriesBurned"], 320);
        assert_eq!(entity["distanceKm"], 5.5);
        assert!(merged.contains("caloriesBurned"));
        assert!(!merged.contains("distanceKm"));
    }

    #[test]
    fn test_prefer_local_object_fills_absent_remote() {
        let route = serde_json::json!({ "points": [[51.5, -0.1], [51.6, -0.1]] });
        let conflict = workout_conflict(
            serde_json::json!({ "route": route }),
            serde_json::json!({}),
        );

        let (entity, merged) = MergePolicy::fitness_defaults().apply(&conflict).unwrap();

        assert_eq!(entity["route"], route);
        assert!(merged.contains("route"));
    }

    #[test]
    fn test_unknown_resource_type_merges_to_remote() {
        let conflict = SyncConflict::new(
            ResourceType::from("heart-rate-zone"),
            "z-1",
            serde_json::json!({ "notes": "local" }),
            serde_json::json!({ "notes": "remote" }),
        );

        let (entity, merged) = MergePolicy::fitness_defaults().apply(&conflict).unwrap();

        assert_eq!(entity, conflict.remote_version);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_non_object_snapshot_is_an_error() {
        let conflict = workout_conflict(serde_json::json!("just a string"), serde_json::json!({}));

        let err = MergePolicy::fitness_defaults().apply(&conflict).unwrap_err();
        assert_eq!(err, ConflictError::NotAnObject { side: "local" });
    }

    #[test]
    fn test_profiles_disagree_on_workout_default() {
        let background = StrategyPolicy::background_sync();
        let interactive = StrategyPolicy::interactive_save();
        let workout = ResourceType::workout();

        assert_eq!(background.default_strategy(&workout), ResolutionStrategy::FieldMerge);
        assert_eq!(interactive.default_strategy(&workout), ResolutionStrategy::ClientWins);
        // The profiles only disagree about workouts.
        let dashboard = ResourceType::dashboard();
        assert_eq!(
            background.default_strategy(&dashboard),
            interactive.default_strategy(&dashboard)
        );
    }

    #[test]
    fn test_unknown_resource_type_uses_fallback() {
        let policy = StrategyPolicy::background_sync();
        let strategy = policy.default_strategy(&ResourceType::from("sleep-session"));

        assert_eq!(strategy, policy.fallback());
    }
}
