//! Current-state resource types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::planner::FieldMap;

use super::labels::{DEFAULT_NAMESPACE, LABEL_MANAGED, LABEL_NAMESPACE, LABEL_PROTECTED};

/// A resource as it currently exists on the remote platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedResource {
    /// Remote identifier.
    pub id: String,
    /// Resource type tag.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name; matched against declarative references.
    pub name: String,
    /// Labels, including management labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Remaining fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: FieldMap,
}

impl ManagedResource {
    /// Creates a resource with no labels or fields.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            name: name.into(),
            labels: BTreeMap::new(),
            fields: FieldMap::new(),
        }
    }

    /// Builder-style label setter.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Namespace from the namespace label, or the default namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.labels
            .get(LABEL_NAMESPACE)
            .map_or(DEFAULT_NAMESPACE, String::as_str)
    }

    /// Returns true if the protected label is set to `true`.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.labels
            .get(LABEL_PROTECTED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Returns true if the resource carries the managed label.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.labels
            .get(LABEL_MANAGED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_accessors() {
        let resource = ManagedResource::new("id-1", "portal", "dev")
            .with_label(LABEL_MANAGED, "true")
            .with_label(LABEL_NAMESPACE, "team-a")
            .with_label(LABEL_PROTECTED, "TRUE");

        assert!(resource.is_managed());
        assert!(resource.is_protected());
        assert_eq!(resource.namespace(), "team-a");
    }

    #[test]
    fn test_unlabelled_resource_defaults() {
        let resource = ManagedResource::new("id-1", "portal", "dev");
        assert!(!resource.is_managed());
        assert!(!resource.is_protected());
        assert_eq!(resource.namespace(), DEFAULT_NAMESPACE);
    }
}
