//! Namespace-scoped current-state cache.
//!
//! Memoizes "managed resources of type T in namespaces N" for one planning
//! pass. Once the wildcard listing of a type has been fetched, narrower
//! namespace queries for that type are answered from memory.

use std::collections::HashMap;
use tracing::debug;

use crate::error::StateError;
use crate::state::{ManagedResource, StateProvider};

/// Namespace selector meaning "every namespace".
pub const WILDCARD_NAMESPACE: &str = "*";

/// Trims, drops empty entries, de-duplicates and sorts a namespace list.
///
/// A wildcard anywhere in the list collapses it to `["*"]`.
#[must_use]
pub fn normalize_namespaces(namespaces: &[String]) -> Vec<String> {
    let mut normalized = Vec::with_capacity(namespaces.len());
    for namespace in namespaces {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            continue;
        }
        if namespace == WILDCARD_NAMESPACE {
            return vec![String::from(WILDCARD_NAMESPACE)];
        }
        normalized.push(namespace.to_string());
    }
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Per-pass cache of managed resource listings.
#[derive(Debug, Default)]
pub struct NamespaceCache {
    /// Listings keyed by (resource type, normalized namespace key).
    listings: HashMap<(String, String), Vec<ManagedResource>>,
    /// Wildcard listings per resource type.
    all: HashMap<String, Vec<ManagedResource>>,
}

impl NamespaceCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists managed resources of a type in the given namespaces.
    ///
    /// # Errors
    ///
    /// Propagates provider errors, including [`StateError::NotConfigured`];
    /// failures are never cached.
    pub async fn list_managed(
        &mut self,
        provider: &dyn StateProvider,
        resource_type: &str,
        namespaces: &[String],
    ) -> Result<Vec<ManagedResource>, StateError> {
        let normalized = normalize_namespaces(namespaces);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let key = (resource_type.to_string(), normalized.join(","));
        if let Some(cached) = self.listings.get(&key) {
            return Ok(cached.clone());
        }

        let is_wildcard = key.1 == WILDCARD_NAMESPACE;
        if !is_wildcard && let Some(all) = self.all.get(resource_type) {
            debug!(
                "Serving {resource_type} in [{}] from wildcard listing",
                key.1
            );
            let filtered: Vec<ManagedResource> = all
                .iter()
                .filter(|r| normalized.iter().any(|ns| ns == r.namespace()))
                .cloned()
                .collect();
            self.listings.insert(key, filtered.clone());
            return Ok(filtered);
        }

        debug!(
            "Listing {resource_type} in [{}] via {}",
            key.1,
            provider.provider_name()
        );
        let resources = provider.list_managed(resource_type, &normalized).await?;

        if is_wildcard {
            self.all.insert(resource_type.to_string(), resources.clone());
        }
        self.listings.insert(key, resources.clone());
        Ok(resources)
    }

    /// Lists managed resources of a type across every namespace.
    ///
    /// # Errors
    ///
    /// Propagates provider errors.
    pub async fn list_all(
        &mut self,
        provider: &dyn StateProvider,
        resource_type: &str,
    ) -> Result<Vec<ManagedResource>, StateError> {
        self.list_managed(provider, resource_type, &[String::from(WILDCARD_NAMESPACE)])
            .await
    }

    /// Finds a managed resource of a type by name across every namespace.
    ///
    /// # Errors
    ///
    /// Propagates provider errors.
    pub async fn find_by_name(
        &mut self,
        provider: &dyn StateProvider,
        resource_type: &str,
        name: &str,
    ) -> Result<Option<ManagedResource>, StateError> {
        Ok(self
            .list_all(provider, resource_type)
            .await?
            .into_iter()
            .find(|r| r.name == name))
    }
}
