//! Plan digests.
//!
//! A digest covers everything an executor acts on: the ordered changes, the
//! execution order and the mode. Generation metadata (timestamp, generator)
//! is excluded, so planning the same inputs twice yields the same digest.

use sha2::{Digest, Sha256};

use super::types::{Change, Plan, Protection};
use super::value::Value;

/// Separator fed between hashed components so adjacent values cannot blur.
const SEP: [u8; 1] = [0x1f];

/// Hasher for computing plan digests.
#[derive(Debug, Default)]
pub struct PlanHasher;

impl PlanHasher {
    /// Creates a new plan hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the digest of a plan.
    #[must_use]
    pub fn hash_plan(&self, plan: &Plan) -> String {
        let mut hasher = Sha256::new();

        hasher.update(plan.metadata.version.as_bytes());
        hasher.update(SEP);
        hasher.update(plan.metadata.mode.to_string().as_bytes());
        hasher.update(SEP);

        for change in &plan.changes {
            hasher.update(self.hash_change(change).as_bytes());
        }
        hasher.update(SEP);

        for id in &plan.execution_order {
            hasher.update(id.as_bytes());
            hasher.update(SEP);
        }

        for warning in &plan.warnings {
            hasher.update(warning.change_id.as_bytes());
            hasher.update(warning.message.as_bytes());
            hasher.update(SEP);
        }

        hex::encode(hasher.finalize())
    }

    /// Computes the digest of a single change.
    #[must_use]
    pub fn hash_change(&self, change: &Change) -> String {
        let mut hasher = Sha256::new();
        let mut put = |bytes: &[u8]| {
            hasher.update(bytes);
            hasher.update(SEP);
        };

        put(change.id.as_bytes());
        put(change.action.as_str().as_bytes());
        put(change.resource_type.as_bytes());
        put(change.resource_ref.as_bytes());
        put(change.resource_id.as_deref().unwrap_or_default().as_bytes());
        put(change.namespace.as_bytes());

        for (key, value) in &change.resource_monikers {
            put(key.as_bytes());
            put(value.as_bytes());
        }

        // Maps are ordered, so iteration is deterministic
        for (key, value) in &change.fields {
            put(key.as_bytes());
            put(canonical(value).as_bytes());
        }

        for (field, info) in &change.references {
            put(field.as_bytes());
            put(info.reference.as_bytes());
            put(info.id.as_bytes());
            for (key, value) in &info.lookup_fields {
                put(key.as_bytes());
                put(value.as_bytes());
            }
            for (reference, id) in info.refs.iter().zip(&info.resolved_ids) {
                put(reference.as_bytes());
                put(id.as_bytes());
            }
        }

        if let Some(parent) = &change.parent {
            put(parent.resource_type.as_bytes());
            put(parent.reference.as_bytes());
            put(parent.id.as_deref().unwrap_or_default().as_bytes());
        }

        match change.protection {
            Some(Protection::Flag(flag)) => put(if flag { "p:1" } else { "p:0" }.as_bytes()),
            Some(Protection::Change(flip)) => {
                put(if flip.old { "o:1" } else { "o:0" }.as_bytes());
                put(if flip.new { "n:1" } else { "n:0" }.as_bytes());
            }
            None => put("-".as_bytes()),
        }

        for dependency in &change.depends_on {
            put(dependency.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 12 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(12).collect()
    }

    /// Compares two digests.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        hash1.len() == hash2.len()
            && hash1
                .bytes()
                .zip(hash2.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

fn canonical(value: &Value) -> String {
    serde_json::Value::from(value.clone()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::types::{ActionType, PlanMode};
    use std::collections::BTreeMap;

    fn plan_with(name: &str) -> Plan {
        let mut plan = Plan::new(PlanMode::Apply, "test");
        plan.add_change(Change {
            id: String::from("1:c:portal:dev"),
            resource_type: String::from("portal"),
            resource_ref: String::from("dev"),
            resource_id: None,
            resource_monikers: BTreeMap::new(),
            action: ActionType::Create,
            fields: BTreeMap::from([(String::from("name"), Value::from(name))]),
            references: BTreeMap::new(),
            parent: None,
            protection: Some(Protection::Flag(false)),
            namespace: String::from("default"),
            depends_on: vec![],
        });
        plan.execution_order = vec![String::from("1:c:portal:dev")];
        plan
    }

    #[test]
    fn test_digest_ignores_generation_metadata() {
        let hasher = PlanHasher::new();
        let first = plan_with("Dev");
        let mut second = plan_with("Dev");
        second.metadata.generator = String::from("other");
        second.metadata.generated_at = first.metadata.generated_at + chrono::Duration::hours(1);

        assert_eq!(hasher.hash_plan(&first), hasher.hash_plan(&second));
    }

    #[test]
    fn test_digest_tracks_field_values() {
        let hasher = PlanHasher::new();
        assert_ne!(
            hasher.hash_plan(&plan_with("Dev")),
            hasher.hash_plan(&plan_with("Developer"))
        );
    }

    #[test]
    fn test_digest_tracks_mode() {
        let hasher = PlanHasher::new();
        let apply = plan_with("Dev");
        let mut sync = plan_with("Dev");
        sync.metadata.mode = PlanMode::Sync;
        assert_ne!(hasher.hash_plan(&apply), hasher.hash_plan(&sync));
    }

    #[test]
    fn test_short_hash_and_match() {
        let hasher = PlanHasher::new();
        let digest = hasher.hash_plan(&plan_with("Dev"));
        assert_eq!(digest.len(), 64);
        assert_eq!(hasher.short_hash(&digest).len(), 12);
        assert!(PlanHasher::hashes_match(&digest, &digest));
        assert!(!PlanHasher::hashes_match(&digest, "abc"));
    }
}
