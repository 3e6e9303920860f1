//! Error types for the declplan planning engine.
//!
//! This module provides the error hierarchy for every stage of a planning
//! pass: configuration loading, current-state queries, reference resolution,
//! protection validation, and execution ordering.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::planner::ActionType;

/// The main error type for the planning engine.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Current-state provider errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Plan construction errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Reference resolution errors.
    #[error("Reference resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Protected resource violations.
    #[error("{0}")]
    Protection(#[from] ProtectionError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Plan document (de)serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A resource-type planner produced a change without a declared-required field.
    #[error("required field {field} not found in {resource_type} resource '{resource_ref}'")]
    MissingRequiredField {
        /// Resource type tag of the change.
        resource_type: String,
        /// Declarative reference of the resource.
        resource_ref: String,
        /// The missing field key.
        field: String,
    },

    /// Two resources of the same type share a declarative reference.
    #[error("Duplicate {resource_type} reference: {reference}")]
    DuplicateReference {
        /// Type of resource.
        resource_type: String,
        /// The duplicated reference.
        reference: String,
    },
}

/// Current-state provider errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// The provider has no client configured for this resource type.
    #[error("{resource_type} client not configured")]
    NotConfigured {
        /// Resource type that cannot be queried.
        resource_type: String,
    },

    /// The provider failed while listing or fetching resources.
    #[error("failed to query {resource_type}: {message}")]
    Provider {
        /// Resource type being queried.
        resource_type: String,
        /// Description of the failure.
        message: String,
    },

    /// A state snapshot could not be read.
    #[error("State snapshot error: {message}")]
    Snapshot {
        /// Description of the snapshot issue.
        message: String,
    },
}

/// Plan construction errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The dependency graph contains a cycle.
    #[error("circular dependency detected in plan: {details}")]
    CircularDependency {
        /// Identifiers of the changes left unordered.
        change_ids: Vec<String>,
        /// Human-readable description of the cycle.
        details: String,
    },

    /// A change depends on an identifier outside the batch.
    #[error("change {change_id} depends on unknown change {dependency}")]
    UnknownDependency {
        /// The change declaring the dependency.
        change_id: String,
        /// The identifier that does not exist.
        dependency: String,
    },

    /// Two changes share an identifier.
    #[error("duplicate change identifier: {id}")]
    DuplicateChangeId {
        /// The duplicated identifier.
        id: String,
    },

    /// A change identifier does not have the `<n>:<action>:<type>:<ref>` shape.
    #[error("invalid change identifier: {id}")]
    InvalidChangeId {
        /// The malformed identifier.
        id: String,
    },

    /// The execution order does not cover every change exactly once.
    #[error("execution order lists {found} changes, plan has {expected}")]
    IncompleteExecutionOrder {
        /// Number of changes in the plan.
        expected: usize,
        /// Number of distinct identifiers in the order.
        found: usize,
    },
}

/// A single reference that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceError {
    /// Identifier of the change holding the reference.
    pub change_id: String,
    /// Field that carries the reference.
    pub field: String,
    /// Declarative name being referenced.
    pub reference: String,
    /// Resource type the field points at, when known.
    pub resource_type: Option<String>,
    /// Why the lookup failed.
    pub reason: String,
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_type {
            Some(resource_type) => write!(
                f,
                "change {}: failed to resolve {} reference {:?} in field {}: {}",
                self.change_id, resource_type, self.reference, self.field, self.reason
            ),
            None => write!(
                f,
                "change {}: failed to resolve reference {:?} in field {}: {}",
                self.change_id, self.reference, self.field, self.reason
            ),
        }
    }
}

/// Reference resolution errors, collected across a whole pass.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// One or more references could not be resolved.
    #[error("{}", format_reference_errors(.errors))]
    Unresolved {
        /// Every failed reference, in change order.
        errors: Vec<ReferenceError>,
    },
}

fn format_reference_errors(errors: &[ReferenceError]) -> String {
    let mut message = format!("{} reference(s) could not be resolved:", errors.len());
    for (i, err) in errors.iter().enumerate() {
        message.push_str(&format!("\n  {}. {err}", i + 1));
    }
    message
}

/// A rejected update or delete of a protected resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionViolation {
    /// Resource type tag.
    pub resource_type: String,
    /// Resource name shown to the user.
    pub resource_name: String,
    /// The rejected action.
    pub action: ActionType,
}

impl fmt::Display for ProtectionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action {
            ActionType::Delete => "deleted",
            ActionType::Update => "updated",
            ActionType::Create => "modified",
        };
        write!(
            f,
            "{} {:?} is protected and cannot be {verb}",
            self.resource_type, self.resource_name
        )
    }
}

/// Protected resource violations, collected across a whole pass.
#[derive(Debug, Error)]
pub enum ProtectionError {
    /// One or more protected resources would be modified.
    #[error("{}", format_violations(.violations))]
    Violations {
        /// Every violation, in the order planners reported them.
        violations: Vec<ProtectionViolation>,
    },
}

fn format_violations(violations: &[ProtectionViolation]) -> String {
    let mut message = String::from("Cannot generate plan due to protected resources:");
    for (i, violation) in violations.iter().enumerate() {
        message.push_str(&format!("\n  {}. {violation}", i + 1));
    }
    message.push_str("\n\nTo proceed, first update these resources to set protected: false");
    message
}

/// Result type alias for planning operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

impl PlannerError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the failure came from user input rather than a planner bug.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Resolve(_)
                | Self::Protection(_)
                | Self::Plan(PlanError::CircularDependency { .. })
                | Self::Config(
                    ConfigError::FileNotFound { .. }
                        | ConfigError::ParseError { .. }
                        | ConfigError::ValidationError { .. }
                        | ConfigError::DuplicateReference { .. }
                )
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates a "not configured" error for a resource type.
    #[must_use]
    pub fn not_configured(resource_type: impl Into<String>) -> Self {
        Self::NotConfigured {
            resource_type: resource_type.into(),
        }
    }

    /// Creates a provider failure for a resource type.
    #[must_use]
    pub fn provider(resource_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            resource_type: resource_type.into(),
            message: message.into(),
        }
    }

    /// Creates a snapshot error with the given message.
    #[must_use]
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Returns true if the resource type should be skipped silently.
    #[must_use]
    pub const fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_error_enumerates_every_violation() {
        let err = ProtectionError::Violations {
            violations: vec![
                ProtectionViolation {
                    resource_type: String::from("api"),
                    resource_name: String::from("checkout"),
                    action: ActionType::Update,
                },
                ProtectionViolation {
                    resource_type: String::from("portal"),
                    resource_name: String::from("dev-portal"),
                    action: ActionType::Delete,
                },
            ],
        };

        let message = err.to_string();
        assert!(message.contains("1. api \"checkout\" is protected and cannot be updated"));
        assert!(message.contains("2. portal \"dev-portal\" is protected and cannot be deleted"));
        assert!(message.contains("set protected: false"));
    }

    #[test]
    fn test_reference_errors_are_listed() {
        let err = ResolveError::Unresolved {
            errors: vec![ReferenceError {
                change_id: String::from("1:c:api_version:v1"),
                field: String::from("api_id"),
                reference: String::from("missing"),
                resource_type: Some(String::from("api")),
                reason: String::from("not found"),
            }],
        };

        let message = err.to_string();
        assert!(message.starts_with("1 reference(s) could not be resolved:"));
        assert!(message.contains("change 1:c:api_version:v1"));
        assert!(message.contains("\"missing\""));
        assert!(message.contains("api_id"));
    }

    #[test]
    fn test_not_configured_is_distinguishable() {
        assert!(StateError::not_configured("portal").is_not_configured());
        assert!(!StateError::provider("portal", "boom").is_not_configured());
        assert!(!StateError::snapshot("bad file").is_not_configured());
    }
}
