//! Desired-state document types.
//!
//! This module defines the structs that map to a `declplan.yaml` file: a list
//! of declaratively named resources plus document-wide defaults.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::planner::{FieldMap, Nullable, ResourceIndex};
use crate::state::labels::DEFAULT_NAMESPACE;

/// The root desired-state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceSet {
    /// Document-wide defaults.
    #[serde(default)]
    pub defaults: Defaults,
    /// Declared resources.
    #[serde(default)]
    pub resources: Vec<DesiredResource>,
}

/// Document-wide defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Defaults {
    /// Namespace for resources that do not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Additional namespaces reconciled in sync mode even when no resource
    /// is declared in them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    /// Generator identity recorded in plans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

/// Pointer from a child resource to its parent declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParentRef {
    /// Resource type of the parent.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Declarative reference of the parent.
    #[serde(rename = "ref")]
    pub reference: String,
}

/// One declared resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesiredResource {
    /// Resource type tag.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Declarative reference, unique per type.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Resource name on the platform.
    pub name: String,
    /// Remote identifier. Declared to adopt an existing resource, otherwise
    /// filled in when the resource is matched against current state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Namespace; the document default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Protection flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,
    /// Description; `null` clears it.
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub description: Nullable<String>,
    /// User labels; `null` clears them.
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub labels: Nullable<BTreeMap<String, String>>,
    /// Parent resource, for child resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    /// Remaining type-specific fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: FieldMap,
}

impl DesiredResource {
    /// Creates a resource with only the identifying fields set.
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        reference: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            reference: reference.into(),
            name: name.into(),
            id: None,
            namespace: None,
            protected: None,
            description: Nullable::Absent,
            labels: Nullable::Absent,
            parent: None,
            fields: FieldMap::new(),
        }
    }

    /// Returns true if the resource is declared protected.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.protected.unwrap_or(false)
    }
}

impl ResourceSet {
    /// Namespace applied to resources that do not name one.
    #[must_use]
    pub fn default_namespace(&self) -> &str {
        self.defaults
            .namespace
            .as_deref()
            .filter(|ns| !ns.trim().is_empty())
            .map_or(DEFAULT_NAMESPACE, str::trim)
    }

    /// Effective namespace of a resource.
    #[must_use]
    pub fn namespace_of<'a>(&'a self, resource: &'a DesiredResource) -> &'a str {
        resource
            .namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.default_namespace())
    }

    /// Sorted set of namespaces the declared resources live in.
    #[must_use]
    pub fn namespaces(&self) -> BTreeSet<String> {
        self.resources
            .iter()
            .map(|r| self.namespace_of(r).to_string())
            .collect()
    }

    /// Namespaces reconciled in sync mode even without declared resources.
    #[must_use]
    pub fn default_namespaces(&self) -> BTreeSet<String> {
        let mut namespaces: BTreeSet<String> = self
            .defaults
            .namespaces
            .iter()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .collect();
        namespaces.insert(self.default_namespace().to_string());
        namespaces
    }

    /// Sorted set of declared resource types.
    #[must_use]
    pub fn resource_types(&self) -> BTreeSet<&str> {
        self.resources
            .iter()
            .map(|r| r.resource_type.as_str())
            .collect()
    }

    /// Declared resources of a type in a namespace, in document order.
    pub fn resources_in<'a>(
        &'a self,
        resource_type: &'a str,
        namespace: &'a str,
    ) -> impl Iterator<Item = &'a DesiredResource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.resource_type == resource_type && self.namespace_of(r) == namespace)
    }

    /// Finds a declared resource by type and reference.
    #[must_use]
    pub fn get(&self, resource_type: &str, reference: &str) -> Option<&DesiredResource> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.reference == reference)
    }
}

impl ResourceIndex<DesiredResource> for ResourceSet {
    fn find(
        &self,
        resource_type: Option<&str>,
        reference: &str,
    ) -> Option<(&str, &DesiredResource)> {
        self.resources
            .iter()
            .find(|r| r.reference == reference && resource_type.is_none_or(|t| r.resource_type == t))
            .map(|r| (r.resource_type.as_str(), r))
    }

    fn type_count(&self, reference: &str) -> usize {
        self.resources
            .iter()
            .filter(|r| r.reference == reference)
            .map(|r| r.resource_type.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}
