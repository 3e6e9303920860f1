//! Plan document types.
//!
//! A [`Plan`] is the versioned document handed to an executor: the ordered
//! [`Change`] list, the execution order, a summary and advisory warnings.
//! Every optional field is skipped when empty so that a plan survives a
//! serialize/deserialize round trip unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::value::FieldMap;

/// Version of the plan document format.
pub const PLAN_FORMAT_VERSION: &str = "1.0";

/// Generator identity recorded when the caller does not supply one.
#[must_use]
pub fn default_generator() -> String {
    format!("declplan/{}", env!("CARGO_PKG_VERSION"))
}

/// Kind of operation a change performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    /// Create a resource.
    Create,
    /// Update a resource in place (including protection flips).
    Update,
    /// Delete a resource.
    Delete,
}

impl ActionType {
    /// Single-letter code used in change identifiers.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Create => 'c',
            Self::Update => 'u',
            Self::Delete => 'd',
        }
    }

    /// Parses the single-letter code used in change identifiers.
    #[must_use]
    pub const fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'c' => Some(Self::Create),
            'u' => Some(Self::Update),
            'd' => Some(Self::Delete),
            _ => None,
        }
    }

    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested planning mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// Additive only: creates and updates.
    #[default]
    Apply,
    /// Full reconciliation, including deletes of managed resources no longer declared.
    Sync,
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Sync => write!(f, "sync"),
        }
    }
}

/// Old/new pair of a protection status flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionChange {
    /// Protection status before the change.
    pub old: bool,
    /// Protection status after the change.
    pub new: bool,
}

impl ProtectionChange {
    /// Returns true if the status actually flips.
    #[must_use]
    pub const fn is_flip(&self) -> bool {
        self.old != self.new
    }
}

/// Protection descriptor of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Protection {
    /// Protection status of a newly created resource.
    Flag(bool),
    /// Protection status flip on update.
    Change(ProtectionChange),
}

/// Resolution of one reference-carrying field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    /// Declarative reference name (scalar fields).
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    /// Resolved remote identifier, or the unknown marker.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Hints the executor uses to find the resource once it exists.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lookup_fields: BTreeMap<String, String>,
    /// Declarative reference names (array fields).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<String>,
    /// Resolved identifiers, parallel to `refs`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolved_ids: Vec<String>,
    /// Per-element lookup hints, parallel to `refs` (e.g. `names`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lookup_arrays: BTreeMap<String, Vec<String>>,
    /// True when the field holds a list of references.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_array: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// Pointer from a child change to its parent resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentInfo {
    /// Resource type tag of the parent.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Declarative reference of the parent.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Remote identifier of the parent, when it already exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One planned create, update or delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Change identifier: `<n>:<action-letter>:<type>:<ref>`.
    pub id: String,
    /// Resource type tag.
    pub resource_type: String,
    /// Declarative reference name of the resource.
    pub resource_ref: String,
    /// Remote identifier, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Human-readable identifiers for resources without a declarative ref.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_monikers: BTreeMap<String, String>,
    /// Operation to perform.
    pub action: ActionType,
    /// New or changed field values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: FieldMap,
    /// Resolved references, keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, ReferenceInfo>,
    /// Parent resource of a hierarchical child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentInfo>,
    /// Protection descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection: Option<Protection>,
    /// Namespace the resource belongs to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Identifiers of changes that must run first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Change {
    /// Adds a dependency unless it is already listed or names this change.
    pub fn add_dependency(&mut self, id: &str) {
        if id != self.id && !self.depends_on.iter().any(|d| d == id) {
            self.depends_on.push(id.to_string());
        }
    }
}

/// Plan metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// Plan format version.
    pub version: String,
    /// Generation timestamp.
    pub generated_at: DateTime<Utc>,
    /// Generator identity.
    pub generator: String,
    /// Requested mode.
    pub mode: PlanMode,
}

/// Protection flip counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionSummary {
    /// Changes turning protection on.
    pub protecting: usize,
    /// Changes turning protection off.
    pub unprotecting: usize,
}

/// Change counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Number of changes.
    pub total_changes: usize,
    /// Count per action.
    #[serde(default)]
    pub by_action: BTreeMap<String, usize>,
    /// Count per resource type.
    #[serde(default)]
    pub by_resource: BTreeMap<String, usize>,
    /// Protection flip counts, when any change flips protection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection_changes: Option<ProtectionSummary>,
}

/// Advisory warning attached to a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWarning {
    /// Identifier of the change the warning concerns.
    pub change_id: String,
    /// Warning text.
    pub message: String,
}

/// A complete plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Document metadata.
    pub metadata: PlanMetadata,
    /// Changes, in execution order once the plan is finalized.
    #[serde(default)]
    pub changes: Vec<Change>,
    /// Change identifiers in the order an executor must apply them.
    #[serde(default)]
    pub execution_order: Vec<String>,
    /// Change counts.
    #[serde(default)]
    pub summary: PlanSummary,
    /// Advisory warnings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PlanWarning>,
}

impl Plan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new(mode: PlanMode, generator: impl Into<String>) -> Self {
        Self {
            metadata: PlanMetadata {
                version: String::from(PLAN_FORMAT_VERSION),
                generated_at: Utc::now(),
                generator: generator.into(),
                mode,
            },
            changes: Vec::new(),
            execution_order: Vec::new(),
            summary: PlanSummary::default(),
            warnings: Vec::new(),
        }
    }

    /// Appends a change and refreshes the summary.
    pub fn add_change(&mut self, change: Change) {
        self.changes.push(change);
        self.update_summary();
    }

    /// Appends a warning for a change.
    pub fn add_warning(&mut self, change_id: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(PlanWarning {
            change_id: change_id.into(),
            message: message.into(),
        });
    }

    /// Returns true if the plan has no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns true if a change already targets this resource.
    #[must_use]
    pub fn has_change(&self, resource_type: &str, resource_ref: &str) -> bool {
        self.changes
            .iter()
            .any(|c| c.resource_type == resource_type && c.resource_ref == resource_ref)
    }

    /// Returns true if any change deletes a resource.
    #[must_use]
    pub fn contains_deletes(&self) -> bool {
        self.changes.iter().any(|c| c.action == ActionType::Delete)
    }

    /// Looks up a change by identifier.
    #[must_use]
    pub fn change(&self, id: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.id == id)
    }

    /// Finds the create change for a resource, if one is planned.
    #[must_use]
    pub fn create_change(&self, resource_type: &str, resource_ref: &str) -> Option<&Change> {
        self.changes.iter().find(|c| {
            c.action == ActionType::Create
                && c.resource_type == resource_type
                && c.resource_ref == resource_ref
        })
    }

    /// Recomputes the summary from the change list.
    pub fn update_summary(&mut self) {
        let mut summary = PlanSummary {
            total_changes: self.changes.len(),
            ..PlanSummary::default()
        };
        let mut protection = ProtectionSummary::default();

        for change in &self.changes {
            *summary
                .by_action
                .entry(change.action.as_str().to_string())
                .or_insert(0) += 1;
            *summary
                .by_resource
                .entry(change.resource_type.clone())
                .or_insert(0) += 1;

            if let Some(Protection::Change(flip)) = change.protection
                && flip.is_flip()
            {
                if flip.new {
                    protection.protecting += 1;
                } else {
                    protection.unprotecting += 1;
                }
            }
        }

        if protection != ProtectionSummary::default() {
            summary.protection_changes = Some(protection);
        }
        self.summary = summary;
    }
}
