//! Field accessor tables.
//!
//! Resource-type planners register one accessor per (resource type, field
//! path). Lookups fall back to accessors registered for [`ANY_TYPE`], so
//! fields shared by every resource (name, identifier) are registered once.

use std::collections::BTreeMap;

use super::value::{FieldMap, Value};

/// Resource type key matching every type.
pub const ANY_TYPE: &str = "*";

/// Reads one field out of a resource.
pub type Accessor<R> = fn(&R) -> Option<Value>;

/// Accessor table keyed by resource type and field path.
pub struct FieldExtractors<R> {
    accessors: BTreeMap<(String, String), Accessor<R>>,
}

impl<R> Default for FieldExtractors<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> std::fmt::Debug for FieldExtractors<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.accessors.keys()).finish()
    }
}

impl<R> FieldExtractors<R> {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            accessors: BTreeMap::new(),
        }
    }

    /// Registers an accessor, replacing any previous one for the same key.
    pub fn register(
        &mut self,
        resource_type: impl Into<String>,
        path: impl Into<String>,
        accessor: Accessor<R>,
    ) -> &mut Self {
        self.accessors
            .insert((resource_type.into(), path.into()), accessor);
        self
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(
        mut self,
        resource_type: impl Into<String>,
        path: impl Into<String>,
        accessor: Accessor<R>,
    ) -> Self {
        self.register(resource_type, path, accessor);
        self
    }

    /// Returns true if an accessor (type-specific or shared) exists.
    #[must_use]
    pub fn contains(&self, resource_type: &str, path: &str) -> bool {
        self.lookup(resource_type, path).is_some()
    }

    /// Extracts one field. Type-specific accessors win over shared ones.
    #[must_use]
    pub fn extract_field(&self, resource_type: &str, path: &str, resource: &R) -> Option<Value> {
        self.lookup(resource_type, path)
            .and_then(|accessor| accessor(resource))
    }

    /// Extracts every registered field for a type, skipping absent ones.
    #[must_use]
    pub fn extract_all(&self, resource_type: &str, resource: &R) -> FieldMap {
        let mut fields = FieldMap::new();
        for path in self.paths(resource_type) {
            if let Some(value) = self.extract_field(resource_type, path, resource) {
                fields.insert(path.to_string(), value);
            }
        }
        fields
    }

    /// Field paths registered for a type, including shared ones, sorted.
    #[must_use]
    pub fn paths(&self, resource_type: &str) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .accessors
            .keys()
            .filter(|(t, _)| t == resource_type || t == ANY_TYPE)
            .map(|(_, p)| p.as_str())
            .collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }

    fn lookup(&self, resource_type: &str, path: &str) -> Option<Accessor<R>> {
        self.accessors
            .get(&(resource_type.to_string(), path.to_string()))
            .or_else(|| {
                self.accessors
                    .get(&(ANY_TYPE.to_string(), path.to_string()))
            })
            .copied()
    }
}
