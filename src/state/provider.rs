//! Current-state provider trait definition.
//!
//! This module defines the interface the planner uses to read what currently
//! exists on the remote platform.

use async_trait::async_trait;

use crate::error::StateError;

use super::types::ManagedResource;

/// Trait for current-state sources.
///
/// Implementations return [`StateError::NotConfigured`] for resource types
/// they cannot query; the planner skips those types silently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Lists managed resources of a type visible in the given namespaces.
    ///
    /// A namespace list of `["*"]` means every namespace.
    async fn list_managed(
        &self,
        resource_type: &str,
        namespaces: &[String],
    ) -> Result<Vec<ManagedResource>, StateError>;

    /// Fetches one resource by remote identifier.
    ///
    /// Returns `None` if it does not exist.
    async fn get(&self, resource_type: &str, id: &str)
    -> Result<Option<ManagedResource>, StateError>;

    /// Gets the provider name.
    fn provider_name(&self) -> &'static str;
}
