//! File-based current-state provider.
//!
//! Reads a snapshot of the remote platform (JSON or YAML) exported ahead of
//! planning. Useful for offline plans and for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::error::StateError;

use super::provider::StateProvider;
use super::types::ManagedResource;

/// Wildcard namespace selector.
const ALL_NAMESPACES: &str = "*";

/// On-disk snapshot document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Resource types the snapshot covers. Absent means "every type".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_types: Option<BTreeSet<String>>,
    /// Resources currently on the platform.
    #[serde(default)]
    pub resources: Vec<ManagedResource>,
}

/// State provider backed by an in-memory snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStateProvider {
    snapshot: StateSnapshot,
}

impl SnapshotStateProvider {
    /// Creates a provider from a snapshot.
    #[must_use]
    pub const fn new(snapshot: StateSnapshot) -> Self {
        Self { snapshot }
    }

    /// Creates a provider covering every type with the given resources.
    #[must_use]
    pub fn from_resources(resources: Vec<ManagedResource>) -> Self {
        Self::new(StateSnapshot {
            configured_types: None,
            resources,
        })
    }

    /// Loads a snapshot file. `.yaml`/`.yml` files are read as YAML, anything
    /// else as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref();
        info!("Loading state snapshot from: {}", path.display());

        let content = fs::read_to_string(path).await.map_err(|e| {
            StateError::snapshot(format!("Failed to read {}: {e}", path.display()))
        })?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let snapshot: StateSnapshot = if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| StateError::snapshot(format!("Failed to parse {}: {e}", path.display())))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| StateError::snapshot(format!("Failed to parse {}: {e}", path.display())))?
        };

        debug!("Snapshot holds {} resources", snapshot.resources.len());
        Ok(Self::new(snapshot))
    }

    /// Returns the underlying snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    fn ensure_configured(&self, resource_type: &str) -> Result<(), StateError> {
        match &self.snapshot.configured_types {
            Some(types) if !types.contains(resource_type) => {
                Err(StateError::not_configured(resource_type))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StateProvider for SnapshotStateProvider {
    async fn list_managed(
        &self,
        resource_type: &str,
        namespaces: &[String],
    ) -> Result<Vec<ManagedResource>, StateError> {
        self.ensure_configured(resource_type)?;

        let all = namespaces.iter().any(|ns| ns == ALL_NAMESPACES);
        Ok(self
            .snapshot
            .resources
            .iter()
            .filter(|r| r.resource_type == resource_type && r.is_managed())
            .filter(|r| all || namespaces.iter().any(|ns| ns == r.namespace()))
            .cloned()
            .collect())
    }

    async fn get(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<ManagedResource>, StateError> {
        self.ensure_configured(resource_type)?;

        Ok(self
            .snapshot
            .resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.id == id)
            .cloned())
    }

    fn provider_name(&self) -> &'static str {
        "snapshot"
    }
}
