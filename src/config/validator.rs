//! Desired-state document validation.
//!
//! Checks the document for problems that make planning meaningless before
//! any current state is read: missing or duplicated references, empty names
//! and malformed namespaces.

use crate::error::{ConfigError, PlannerError, Result};
use crate::planner::{RefPlaceholder, Value};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{DesiredResource, ResourceSet};

/// Longest namespace accepted.
const MAX_NAMESPACE_LEN: usize = 63;

/// Validator for desired-state documents.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a desired-state document.
    ///
    /// # Errors
    ///
    /// Returns the first error found; [`collect`](Self::collect) returns all
    /// of them.
    pub fn validate(&self, resources: &ResourceSet) -> Result<ValidationResult> {
        let result = self.collect(resources);

        if result.errors.is_empty() {
            debug!("Desired state validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(PlannerError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Runs every check and returns all errors and warnings.
    #[must_use]
    pub fn collect(&self, resources: &ResourceSet) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_defaults(resources, &mut result);

        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        for (idx, resource) in resources.resources.iter().enumerate() {
            let path = format!("resources[{idx}]");
            Self::validate_resource(resources, resource, &path, &mut result);

            if !resource.reference.is_empty()
                && !seen.insert((resource.resource_type.as_str(), resource.reference.as_str()))
            {
                let duplicate = ConfigError::DuplicateReference {
                    resource_type: resource.resource_type.clone(),
                    reference: resource.reference.clone(),
                };
                result.errors.push(ValidationError {
                    field: format!("{path}.ref"),
                    message: duplicate.to_string(),
                });
            }
        }

        result
    }

    fn validate_defaults(resources: &ResourceSet, result: &mut ValidationResult) {
        if let Some(namespace) = &resources.defaults.namespace {
            check_namespace(namespace, "defaults.namespace", result);
        }
        for (idx, namespace) in resources.defaults.namespaces.iter().enumerate() {
            check_namespace(namespace, &format!("defaults.namespaces[{idx}]"), result);
        }
    }

    fn validate_resource(
        resources: &ResourceSet,
        resource: &DesiredResource,
        path: &str,
        result: &mut ValidationResult,
    ) {
        if resource.resource_type.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{path}.type"),
                message: String::from("Resource type cannot be empty"),
            });
        } else if !is_valid_type(&resource.resource_type) {
            result.errors.push(ValidationError {
                field: format!("{path}.type"),
                message: format!(
                    "Resource type '{}' is invalid. Must be lowercase alphanumeric with underscores.",
                    resource.resource_type
                ),
            });
        }

        if resource.reference.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{path}.ref"),
                message: String::from("Resource reference cannot be empty"),
            });
        } else if resource.reference.contains('#') || resource.reference.chars().any(char::is_whitespace) {
            result.errors.push(ValidationError {
                field: format!("{path}.ref"),
                message: format!(
                    "Resource reference '{}' cannot contain whitespace or '#'",
                    resource.reference
                ),
            });
        }

        if resource.name.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{path}.name"),
                message: format!("{} '{}' has an empty name", resource.resource_type, resource.reference),
            });
        }

        if let Some(namespace) = &resource.namespace {
            check_namespace(namespace, &format!("{path}.namespace"), result);
        }

        if let Some(parent) = &resource.parent {
            if parent.resource_type == resource.resource_type && parent.reference == resource.reference {
                result.errors.push(ValidationError {
                    field: format!("{path}.parent"),
                    message: format!("{} '{}' cannot be its own parent", resource.resource_type, resource.reference),
                });
            } else if resources.get(&parent.resource_type, &parent.reference).is_none() {
                result.warnings.push(format!(
                    "{} '{}' has parent {} '{}' which is not declared; it must already exist",
                    resource.resource_type, resource.reference, parent.resource_type, parent.reference
                ));
            }
        }

        for (key, value) in &resource.fields {
            check_field_value(value, &format!("{path}.fields.{key}"), result);
        }
    }
}

/// Rejects reference placeholders that cannot name a single target.
fn check_field_value(value: &Value, field: &str, result: &mut ValidationResult) {
    match value {
        // Documents parse well-formed placeholders into references, so a
        // prefixed string here is malformed or would change meaning once saved
        Value::String(s) if RefPlaceholder::is_placeholder(s) => {
            let message = if RefPlaceholder::parse(s).is_some() {
                format!("String '{s}' carries the reference prefix but is not a reference")
            } else {
                format!("Malformed reference '{s}'. Expected __REF__:<ref> or __REF__:<ref>#<field>.")
            };
            result.errors.push(ValidationError {
                field: field.to_string(),
                message,
            });
        }
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                check_field_value(item, &format!("{field}[{i}]"), result);
            }
        }
        Value::Map(map) => {
            for (key, item) in map {
                check_field_value(item, &format!("{field}.{key}"), result);
            }
        }
        _ => {
            if let Some(placeholder) = value.as_reference() {
                check_placeholder(placeholder, field, result);
            }
        }
    }
}

fn check_placeholder(placeholder: &RefPlaceholder, field: &str, result: &mut ValidationResult) {
    if placeholder.reference.contains('#')
        || placeholder.reference.chars().any(char::is_whitespace)
        || placeholder.field.contains('#')
    {
        result.errors.push(ValidationError {
            field: field.to_string(),
            message: format!(
                "Reference '{placeholder}' is ambiguous. Reference names cannot contain whitespace or '#', and a single '#' separates the field."
            ),
        });
    }
}

fn check_namespace(namespace: &str, field: &str, result: &mut ValidationResult) {
    if !is_valid_namespace(namespace) {
        result.errors.push(ValidationError {
            field: field.to_string(),
            message: format!(
                "Namespace '{namespace}' is invalid. Must be 1-{MAX_NAMESPACE_LEN} lowercase alphanumeric characters or hyphens."
            ),
        });
    }
}

/// Checks if a namespace is valid.
///
/// Valid namespaces are lowercase alphanumeric with hyphens, at most 63
/// characters, and neither start nor end with a hyphen.
fn is_valid_namespace(namespace: &str) -> bool {
    if namespace.is_empty() || namespace.len() > MAX_NAMESPACE_LEN {
        return false;
    }

    if !namespace
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return false;
    }

    !namespace.starts_with('-') && !namespace.ends_with('-')
}

/// Checks if a resource type tag is valid (`api_version`, `portal`).
fn is_valid_type(resource_type: &str) -> bool {
    resource_type
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase())
        && resource_type
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParentRef;
    use std::collections::BTreeMap;

    fn resource_set(resources: Vec<DesiredResource>) -> ResourceSet {
        ResourceSet {
            resources,
            ..ResourceSet::default()
        }
    }

    #[test]
    fn test_valid_namespace() {
        assert!(is_valid_namespace("default"));
        assert!(is_valid_namespace("team-a"));
        assert!(is_valid_namespace("2024"));
    }

    #[test]
    fn test_invalid_namespace() {
        assert!(!is_valid_namespace(""));
        assert!(!is_valid_namespace("Team-A"));
        assert!(!is_valid_namespace("team_a"));
        assert!(!is_valid_namespace("-team"));
        assert!(!is_valid_namespace("team-"));
        assert!(!is_valid_namespace(&"a".repeat(64)));
    }

    #[test]
    fn test_valid_type() {
        assert!(is_valid_type("api_version"));
        assert!(!is_valid_type("ApiVersion"));
        assert!(!is_valid_type("_api"));
    }

    #[test]
    fn test_valid_document() {
        let resources = resource_set(vec![
            DesiredResource::new("api", "checkout", "Checkout API"),
            DesiredResource::new("portal", "checkout", "Checkout Portal"),
        ]);
        let result = ConfigValidator::new().validate(&resources).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_duplicate_reference() {
        let resources = resource_set(vec![
            DesiredResource::new("api", "checkout", "Checkout API"),
            DesiredResource::new("api", "checkout", "Checkout API v2"),
        ]);
        let err = ConfigValidator::new().validate(&resources).unwrap_err();
        assert!(err.to_string().contains("Duplicate api reference: checkout"));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let mut bad_namespace = DesiredResource::new("api", "b", "B");
        bad_namespace.namespace = Some(String::from("Team A"));
        let resources = resource_set(vec![DesiredResource::new("api", "", " "), bad_namespace]);

        let result = ConfigValidator::new().collect(&resources);
        assert_eq!(result.error_count(), 3);
        assert_eq!(result.errors[0].field, "resources[0].ref");
        assert_eq!(result.errors[1].field, "resources[0].name");
        assert_eq!(result.errors[2].field, "resources[1].namespace");
    }

    /// Field value as it comes out of a parsed document.
    fn parsed(raw: &str) -> Value {
        Value::from(serde_json::Value::from(raw))
    }

    #[test]
    fn test_malformed_references_in_fields() {
        let mut portal = DesiredResource::new("portal", "dev", "Developer Portal");
        portal.fields.insert(String::from("api_id"), parsed("__REF__:checkout#id#name"));
        portal.fields.insert(String::from("team_id"), parsed("__REF__:"));
        portal.fields.insert(
            String::from("auth_strategy_ids"),
            Value::List(vec![parsed("__REF__:okta"), Value::from(RefPlaceholder::new("my strategy"))]),
        );
        portal.fields.insert(
            String::from("settings"),
            Value::Map(BTreeMap::from([(String::from("note"), Value::from("__REF__:plain"))])),
        );

        let result = ConfigValidator::new().collect(&resource_set(vec![portal]));
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "resources[0].fields.api_id",
                "resources[0].fields.auth_strategy_ids[1]",
                "resources[0].fields.settings.note",
                "resources[0].fields.team_id",
            ]
        );
        assert!(result.errors[0].message.contains("ambiguous"));
        assert!(result.errors[2].message.contains("not a reference"));
        assert!(result.errors[3].message.contains("Malformed reference"));
    }

    #[test]
    fn test_well_formed_references_pass() {
        let mut version = DesiredResource::new("api_version", "v1", "v1");
        version.fields.insert(String::from("api_id"), parsed("__REF__:checkout"));
        version.fields.insert(String::from("title"), parsed("__REF__:checkout#name"));
        version.fields.insert(String::from("summary"), Value::from("no reference here"));
        let result = ConfigValidator::new().collect(&resource_set(vec![version]));
        assert!(result.is_valid());
    }

    #[test]
    fn test_undeclared_parent_is_a_warning() {
        let mut version = DesiredResource::new("api_version", "v1", "v1");
        version.parent = Some(ParentRef {
            resource_type: String::from("api"),
            reference: String::from("existing"),
        });
        let result = ConfigValidator::new().validate(&resource_set(vec![version])).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }
}
