//! Reference resolver.
//!
//! After every resource-type planner has run, the resolver walks the batch
//! and resolves each forward reference to a remote identifier. A reference to
//! a resource created in the same batch cannot be resolved yet: it is marked
//! [`UNKNOWN_ID`], carries a lookup hint for the executor, and makes the
//! referencing change depend on the create. References that cannot be found
//! anywhere are collected as errors; resolution continues for the rest.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::error::{ReferenceError, StateError};
use crate::state::StateProvider;

use super::cache::NamespaceCache;
use super::extract::FieldExtractors;
use super::reference::{RefPlaceholder, looks_like_remote_id};
use super::types::{ActionType, Change, PlanWarning, ReferenceInfo};
use super::value::{Value, field_at_path};

/// Identifier recorded for references that are resolved during execution.
pub const UNKNOWN_ID: &str = "[unknown]";

/// Lookup-hint key of scalar references.
pub const LOOKUP_NAME: &str = "name";

/// Lookup-hint key of array references.
pub const LOOKUP_NAMES: &str = "names";

/// Field of a resource holding its remote identifier.
const ID_FIELD: &str = "id";

/// Same-batch lookup of declared resources by reference.
pub trait ResourceIndex<R> {
    /// Finds a declared resource, optionally constrained to a type. Returns
    /// the resource's type tag with it.
    fn find(&self, resource_type: Option<&str>, reference: &str) -> Option<(&str, &R)>;

    /// Number of resource types declaring the reference.
    fn type_count(&self, reference: &str) -> usize {
        usize::from(self.find(None, reference).is_some())
    }
}

/// Resource type a reference field points at.
///
/// Only fields known to link resources are listed, so ordinary string fields
/// are never mistaken for references.
#[must_use]
pub fn reference_target_type(field: &str) -> Option<&'static str> {
    match field {
        "default_application_auth_strategy_id" | "auth_strategy_ids" => {
            Some("application_auth_strategy")
        }
        "control_plane_id" | "members" => Some("control_plane"),
        "portal_id" => Some("portal"),
        "api_id" | "entity_id" => Some("api"),
        "gateway_service_id" | "service_id" => Some("gateway_service"),
        "team_id" => Some("team"),
        _ => None,
    }
}

/// What the resolver learned from one run.
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    /// References resolved to a concrete value.
    pub resolved: usize,
    /// References left for the executor.
    pub unknown: usize,
    /// Warnings for references left for the executor.
    pub warnings: Vec<PlanWarning>,
    /// References that could not be found.
    pub errors: Vec<ReferenceError>,
}

#[derive(Debug)]
struct PendingCreate {
    id: String,
    resource_type: String,
    resource_ref: String,
}

#[derive(Debug)]
enum Resolution {
    Known { value: String, name: Option<String> },
    Pending { dependency: String, name: String },
    Missing { resource_type: Option<String>, reason: String },
}

/// Resolves forward references in a batch of changes.
pub struct ReferenceResolver<'a, R> {
    provider: &'a dyn StateProvider,
    cache: &'a mut NamespaceCache,
    index: Option<&'a dyn ResourceIndex<R>>,
    extractors: &'a FieldExtractors<R>,
}

impl<'a, R> ReferenceResolver<'a, R> {
    /// Creates a resolver backed by current state only.
    pub fn new(
        provider: &'a dyn StateProvider,
        cache: &'a mut NamespaceCache,
        extractors: &'a FieldExtractors<R>,
    ) -> Self {
        Self {
            provider,
            cache,
            index: None,
            extractors,
        }
    }

    /// Consults declared resources before current state.
    #[must_use]
    pub fn with_index(mut self, index: &'a dyn ResourceIndex<R>) -> Self {
        self.index = Some(index);
        self
    }

    /// Resolves every reference in `changes`, recording results in each
    /// change's reference map and dependency list.
    ///
    /// # Errors
    ///
    /// Returns an error only when current state cannot be queried; missing
    /// references are reported in the outcome.
    pub async fn resolve(&mut self, changes: &mut [Change]) -> Result<ResolveOutcome, StateError> {
        let creates: Vec<PendingCreate> = changes
            .iter()
            .filter(|c| c.action == ActionType::Create)
            .map(|c| PendingCreate {
                id: c.id.clone(),
                resource_type: c.resource_type.clone(),
                resource_ref: c.resource_ref.clone(),
            })
            .collect();

        let mut outcome = ResolveOutcome::default();

        for change in changes.iter_mut() {
            if change.action == ActionType::Delete {
                continue;
            }

            let candidates: Vec<(String, Value)> = change
                .fields
                .iter()
                .filter(|(field, value)| is_reference_candidate(field, value))
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect();

            for (field, value) in candidates {
                let target_type = reference_target_type(&field);
                if let Value::List(items) = &value {
                    self.resolve_array(change, &creates, &field, target_type, items, &mut outcome)
                        .await?;
                } else if let Some(placeholder) = as_placeholder(&value, target_type) {
                    self.resolve_scalar(change, &creates, &field, target_type, &placeholder, &mut outcome)
                        .await?;
                }
            }

            self.resolve_parent(change, &creates, &mut outcome).await?;
        }

        info!(
            "Resolved {} reference(s), {} left for execution, {} failed",
            outcome.resolved,
            outcome.unknown,
            outcome.errors.len()
        );
        Ok(outcome)
    }

    async fn resolve_scalar(
        &mut self,
        change: &mut Change,
        creates: &[PendingCreate],
        field: &str,
        target_type: Option<&str>,
        placeholder: &RefPlaceholder,
        outcome: &mut ResolveOutcome,
    ) -> Result<(), StateError> {
        let resolution = self
            .resolve_one(creates, &change.id, target_type, placeholder)
            .await?;

        let mut info = ReferenceInfo {
            reference: placeholder.reference.clone(),
            ..ReferenceInfo::default()
        };

        match resolution {
            Resolution::Known { value, .. } => {
                debug!("{}: {field}={} resolved to {value}", change.id, placeholder.reference);
                info.id = value;
                outcome.resolved += 1;
            }
            Resolution::Pending { dependency, name } => {
                info.id = String::from(UNKNOWN_ID);
                info.lookup_fields.insert(String::from(LOOKUP_NAME), name);
                change.add_dependency(&dependency);
                record_pending(change, field, &placeholder.reference, outcome);
            }
            Resolution::Missing {
                resource_type,
                reason,
            } => {
                outcome.errors.push(ReferenceError {
                    change_id: change.id.clone(),
                    field: field.to_string(),
                    reference: placeholder.reference.clone(),
                    resource_type,
                    reason,
                });
                return Ok(());
            }
        }

        change.references.insert(field.to_string(), info);
        Ok(())
    }

    async fn resolve_array(
        &mut self,
        change: &mut Change,
        creates: &[PendingCreate],
        field: &str,
        target_type: Option<&str>,
        items: &[Value],
        outcome: &mut ResolveOutcome,
    ) -> Result<(), StateError> {
        let mut info = ReferenceInfo {
            is_array: true,
            ..ReferenceInfo::default()
        };
        let mut names = Vec::with_capacity(items.len());
        let mut failed = false;

        for item in items {
            if let Value::String(id) = item
                && looks_like_remote_id(id)
            {
                info.refs.push(id.clone());
                info.resolved_ids.push(id.clone());
                names.push(String::new());
                continue;
            }

            let Some(placeholder) = as_placeholder(item, target_type) else {
                failed = true;
                outcome.errors.push(ReferenceError {
                    change_id: change.id.clone(),
                    field: field.to_string(),
                    reference: item.to_plain_string(),
                    resource_type: target_type.map(str::to_string),
                    reason: String::from("array item is neither a reference nor a remote id"),
                });
                continue;
            };

            match self
                .resolve_one(creates, &change.id, target_type, &placeholder)
                .await?
            {
                Resolution::Known { value, name } => {
                    info.resolved_ids.push(value);
                    names.push(name.unwrap_or_else(|| placeholder.reference.clone()));
                    outcome.resolved += 1;
                }
                Resolution::Pending { dependency, name } => {
                    info.resolved_ids.push(String::from(UNKNOWN_ID));
                    names.push(name);
                    change.add_dependency(&dependency);
                    record_pending(change, field, &placeholder.reference, outcome);
                }
                Resolution::Missing {
                    resource_type,
                    reason,
                } => {
                    failed = true;
                    outcome.errors.push(ReferenceError {
                        change_id: change.id.clone(),
                        field: field.to_string(),
                        reference: placeholder.reference.clone(),
                        resource_type,
                        reason,
                    });
                    info.resolved_ids.push(String::new());
                    names.push(String::new());
                }
            }
            info.refs.push(placeholder.reference);
        }

        if failed || info.refs.is_empty() {
            return Ok(());
        }
        if names.iter().any(|n| !n.is_empty()) {
            info.lookup_arrays.insert(String::from(LOOKUP_NAMES), names);
        }
        change.references.insert(field.to_string(), info);
        Ok(())
    }

    async fn resolve_parent(
        &mut self,
        change: &mut Change,
        creates: &[PendingCreate],
        outcome: &mut ResolveOutcome,
    ) -> Result<(), StateError> {
        let Some(parent) = change.parent.as_ref().filter(|p| p.id.is_none()) else {
            return Ok(());
        };
        let parent_type = parent.resource_type.clone();
        let placeholder = RefPlaceholder::new(parent.reference.clone());

        match self
            .resolve_one(creates, &change.id, Some(&parent_type), &placeholder)
            .await?
        {
            Resolution::Known { value, .. } => {
                if let Some(parent) = change.parent.as_mut() {
                    parent.id = Some(value);
                }
                outcome.resolved += 1;
            }
            Resolution::Pending { dependency, .. } => change.add_dependency(&dependency),
            Resolution::Missing {
                resource_type,
                reason,
            } => outcome.errors.push(ReferenceError {
                change_id: change.id.clone(),
                field: String::from("parent"),
                reference: placeholder.reference,
                resource_type,
                reason,
            }),
        }
        Ok(())
    }

    async fn resolve_one(
        &mut self,
        creates: &[PendingCreate],
        change_id: &str,
        target_type: Option<&str>,
        placeholder: &RefPlaceholder,
    ) -> Result<Resolution, StateError> {
        if target_type.is_none() {
            let created: BTreeSet<&str> = creates
                .iter()
                .filter(|c| c.resource_ref == placeholder.reference && c.id != change_id)
                .map(|c| c.resource_type.as_str())
                .collect();
            let declared_types = self.index.map_or(0, |index| index.type_count(&placeholder.reference));
            if created.len().max(declared_types) > 1 {
                return Ok(Resolution::Missing {
                    resource_type: None,
                    reason: String::from(
                        "reference matches resources of several types; use a typed reference field",
                    ),
                });
            }
        }

        let extractors = self.extractors;
        let declared = self
            .index
            .and_then(|index| index.find(target_type, &placeholder.reference));
        let declared_name = declared.and_then(|(resource_type, resource)| {
            extractors
                .extract_field(resource_type, LOOKUP_NAME, resource)
                .map(|v| v.to_plain_string())
        });

        if !placeholder.targets_id()
            && let Some((resource_type, resource)) = declared
            && let Some(value) = extractors.extract_field(resource_type, &placeholder.field, resource)
        {
            return Ok(Resolution::Known {
                value: value.to_plain_string(),
                name: declared_name,
            });
        }

        if let Some(create) = creates.iter().find(|c| {
            c.resource_ref == placeholder.reference
                && c.id != change_id
                && target_type.is_none_or(|t| c.resource_type == t)
        }) {
            return Ok(Resolution::Pending {
                dependency: create.id.clone(),
                name: declared_name.unwrap_or_else(|| placeholder.reference.clone()),
            });
        }

        if placeholder.targets_id()
            && let Some((resource_type, resource)) = declared
            && let Some(id) = extractors
                .extract_field(resource_type, ID_FIELD, resource)
                .map(|v| v.to_plain_string())
                .filter(|id| !id.is_empty())
        {
            return Ok(Resolution::Known {
                value: id,
                name: declared_name,
            });
        }

        let lookup_type = declared
            .map(|(resource_type, _)| resource_type.to_string())
            .or_else(|| target_type.map(str::to_string));
        let Some(lookup_type) = lookup_type else {
            return Ok(Resolution::Missing {
                resource_type: None,
                reason: String::from("resource type of the reference is unknown"),
            });
        };
        let lookup_name = declared_name.unwrap_or_else(|| placeholder.reference.clone());

        let found = match self
            .cache
            .find_by_name(self.provider, &lookup_type, &lookup_name)
            .await
        {
            Ok(found) => found,
            Err(e) if e.is_not_configured() => {
                debug!("{lookup_type} not configured, cannot look up {lookup_name:?}");
                None
            }
            Err(e) => return Err(e),
        };

        let Some(resource) = found else {
            return Ok(Resolution::Missing {
                reason: format!(
                    "{lookup_type} {lookup_name:?} not found in configuration or current state"
                ),
                resource_type: Some(lookup_type),
            });
        };

        let value = if placeholder.targets_id() {
            Some(resource.id.clone())
        } else if placeholder.field == LOOKUP_NAME {
            Some(resource.name.clone())
        } else {
            field_at_path(&resource.fields, &placeholder.field).map(Value::to_plain_string)
        };

        Ok(value.map_or_else(
            || Resolution::Missing {
                reason: format!("{lookup_type} {lookup_name:?} has no field {}", placeholder.field),
                resource_type: Some(lookup_type.clone()),
            },
            |value| Resolution::Known {
                value,
                name: Some(resource.name.clone()),
            },
        ))
    }
}

fn record_pending(change: &Change, field: &str, reference: &str, outcome: &mut ResolveOutcome) {
    warn!("{}: reference {field}={reference} will be resolved during execution", change.id);
    outcome.unknown += 1;
    outcome.warnings.push(PlanWarning {
        change_id: change.id.clone(),
        message: format!("Reference {field}={reference} will be resolved during execution"),
    });
}

/// Returns true if a string is a reference by name in a reference field.
fn is_named_reference(value: &str, target_type: Option<&str>) -> bool {
    target_type.is_some() && !value.is_empty() && !looks_like_remote_id(value)
}

pub(crate) fn is_reference_candidate(field: &str, value: &Value) -> bool {
    let target_type = reference_target_type(field);
    match value {
        Value::Reference(_) => true,
        Value::String(s) => is_named_reference(s, target_type),
        Value::List(items) => items.iter().any(|item| match item {
            Value::Reference(_) => true,
            Value::String(s) => is_named_reference(s, target_type),
            _ => false,
        }),
        _ => false,
    }
}

fn as_placeholder(value: &Value, target_type: Option<&str>) -> Option<RefPlaceholder> {
    match value {
        Value::Reference(placeholder) => Some(placeholder.clone()),
        Value::String(s) if is_named_reference(s, target_type) => Some(RefPlaceholder::new(s.clone())),
        _ => None,
    }
}
