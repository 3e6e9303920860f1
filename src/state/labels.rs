//! Management labels.
//!
//! Resources created by declplan carry a small set of labels identifying them
//! as managed, their namespace and their protection status. These labels are
//! owned by the tool and never compared as user configuration.

use std::collections::BTreeMap;

/// Prefix shared by every management label.
pub const LABEL_PREFIX: &str = "DECLPLAN-";

/// Marks a resource as managed.
pub const LABEL_MANAGED: &str = "DECLPLAN-managed";

/// Namespace the resource belongs to.
pub const LABEL_NAMESPACE: &str = "DECLPLAN-namespace";

/// Protection status (`"true"` when protected).
pub const LABEL_PROTECTED: &str = "DECLPLAN-protected";

/// Namespace assumed when none is declared.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Returns true for labels owned by the tool.
#[must_use]
pub fn is_management_label(key: &str) -> bool {
    key.starts_with(LABEL_PREFIX)
}

/// Returns only the user-defined labels.
#[must_use]
pub fn user_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter(|(key, _)| !is_management_label(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Returns true if the user-defined labels of `current` differ from `desired`.
#[must_use]
pub fn user_labels_differ(
    current: &BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> bool {
    user_labels(current) != user_labels(desired)
}

/// Builds the management labels for a resource.
#[must_use]
pub fn management_labels(namespace: &str, protected: bool) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_MANAGED.to_string(), String::from("true"));
    labels.insert(LABEL_NAMESPACE.to_string(), namespace.to_string());
    if protected {
        labels.insert(LABEL_PROTECTED.to_string(), String::from("true"));
    }
    labels
}
