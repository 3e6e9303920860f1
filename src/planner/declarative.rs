//! Table-driven planner for field-bag resources.
//!
//! Handles one resource type whose declared and current values are plain
//! field maps. Declared resources are matched to current ones by remote id
//! when known, otherwise by name; unmatched declarations become creates,
//! matched ones are compared field by field, and in sync mode managed
//! resources nobody declares any more are deleted.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{DesiredResource, ParentRef, ResourceSet};
use crate::error::Result;
use crate::state::ManagedResource;
use crate::state::labels::{management_labels, user_labels, user_labels_differ};

use super::builder::{CreateConfig, DeleteConfig, UpdateConfig};
use super::engine::{PlanningContext, ResourcePlanner};
use super::extract::{ANY_TYPE, FieldExtractors};
use super::protection::ProtectionValidator;
use super::resolver::is_reference_candidate;
use super::types::{ParentInfo, Plan, PlanMode, ProtectionChange};
use super::value::{FieldMap, Value};

/// Decides whether a current resource needs updating and which fields change.
pub type Comparator = fn(&DesiredResource, &ManagedResource) -> (bool, FieldMap);

/// Accessors shared by every declared resource.
#[must_use]
pub fn standard_extractors() -> FieldExtractors<DesiredResource> {
    FieldExtractors::new()
        .with(ANY_TYPE, "name", |r: &DesiredResource| {
            Some(Value::from(r.name.as_str()))
        })
        .with(ANY_TYPE, "id", |r: &DesiredResource| {
            r.id.as_deref().map(Value::from)
        })
        .with(ANY_TYPE, "description", |r: &DesiredResource| {
            r.description.to_field_value(|d| Value::from(d.as_str()))
        })
        .with(ANY_TYPE, "labels", |r: &DesiredResource| {
            r.labels.to_field_value(|l| Value::from(l.clone()))
        })
}

/// Compares description, user labels and declared fields.
///
/// Absent description or labels are left alone; `null` clears them.
/// Reference-valued fields are only sent on create: their remote value is an
/// identifier the declaration does not know yet.
#[must_use]
pub fn compare_fields(desired: &DesiredResource, current: &ManagedResource) -> (bool, FieldMap) {
    let mut changed = FieldMap::new();

    if let Some(description) = desired
        .description
        .to_field_value(|d| Value::from(d.as_str()))
    {
        let unchanged = current
            .fields
            .get("description")
            .map_or(description.is_null(), |existing| *existing == description);
        if !unchanged {
            changed.insert(String::from("description"), description);
        }
    }

    match desired.labels.as_option() {
        Some(labels) if user_labels_differ(&current.labels, labels) => {
            changed.insert(String::from("labels"), Value::from(labels.clone()));
        }
        None if !desired.labels.is_absent() && !user_labels(&current.labels).is_empty() => {
            changed.insert(String::from("labels"), Value::Null);
        }
        _ => {}
    }

    for (field, value) in &desired.fields {
        if is_reference_candidate(field, value) {
            continue;
        }
        if current.fields.get(field) != Some(value) {
            changed.insert(field.clone(), value.clone());
        }
    }

    (!changed.is_empty(), changed)
}

/// Resource-type planner over [`DesiredResource`] declarations.
#[derive(Debug, Clone)]
pub struct DeclarativeResourcePlanner {
    resource_type: String,
    required_fields: Vec<String>,
    comparator: Comparator,
}

impl DeclarativeResourcePlanner {
    /// Creates a planner for one resource type using [`compare_fields`].
    #[must_use]
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            required_fields: vec![String::from("name")],
            comparator: compare_fields,
        }
    }

    /// Adds a field every create must carry.
    #[must_use]
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }

    /// Replaces the comparator.
    #[must_use]
    pub const fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    fn plan_create(
        &self,
        ctx: &PlanningContext<'_>,
        plan: &mut Plan,
        resource: &DesiredResource,
    ) -> Result<()> {
        let parent = resource
            .parent
            .as_ref()
            .map(|p| parent_info(ctx.resources, p));

        let mut depends_on = Vec::new();
        if let Some(parent) = parent.as_ref().filter(|p| p.id.is_none())
            && let Some(create) = plan.create_change(&parent.resource_type, &parent.reference)
        {
            depends_on.push(create.id.clone());
        }

        let extractors = ctx.extractors;
        let namespace = ctx.namespace;
        let protected = resource.is_protected();
        let change = ctx.builder.plan_create(
            CreateConfig {
                resource_type: self.resource_type.clone(),
                resource_ref: resource.reference.clone(),
                namespace: namespace.to_string(),
                required_fields: self.required_fields.clone(),
                protected: Some(protected),
                parent,
                depends_on,
            },
            || {
                let mut fields = resource.fields.clone();
                fields.extend(extractors.extract_all(&self.resource_type, resource));

                // New resources carry the management labels next to the user's
                let mut labels = resource.labels.as_option().map(user_labels).unwrap_or_default();
                labels.extend(management_labels(namespace, protected));
                fields.insert(String::from("labels"), Value::from(labels));
                fields
            },
        )?;
        plan.add_change(change);
        Ok(())
    }

    fn plan_update(
        &self,
        ctx: &mut PlanningContext<'_>,
        plan: &mut Plan,
        resource: &DesiredResource,
        current: &ManagedResource,
    ) -> Result<()> {
        let (needs_update, changed_fields) = (self.comparator)(resource, current);

        let current_protected = current.is_protected();
        let requested = ProtectionChange {
            old: current_protected,
            new: resource.protected.unwrap_or(current_protected),
        };
        let flip = requested.is_flip().then_some(requested);

        if !needs_update && flip.is_none() {
            debug!("{} '{}' is up to date", self.resource_type, resource.reference);
            return Ok(());
        }

        let allowed = ctx.protection.record(ProtectionValidator::check_update(
            &self.resource_type,
            &resource.name,
            current_protected,
            flip,
            needs_update,
        ));
        if !allowed {
            return Ok(());
        }

        let change = match flip {
            Some(flip) if !needs_update => ctx.builder.plan_protection_change(
                &self.resource_type,
                &resource.reference,
                &current.id,
                ctx.namespace,
                flip,
            ),
            _ => ctx.builder.plan_update(UpdateConfig {
                resource_type: self.resource_type.clone(),
                resource_ref: resource.reference.clone(),
                resource_id: current.id.clone(),
                namespace: ctx.namespace.to_string(),
                changed_fields,
                protection: flip,
                parent: resource
                    .parent
                    .as_ref()
                    .map(|p| parent_info(ctx.resources, p)),
                ..UpdateConfig::default()
            })?,
        };
        plan.add_change(change);
        Ok(())
    }

    fn plan_delete(&self, ctx: &mut PlanningContext<'_>, plan: &mut Plan, current: &ManagedResource) {
        let allowed = ctx.protection.record(ProtectionValidator::check_delete(
            &self.resource_type,
            &current.name,
            current.is_protected(),
        ));
        if !allowed {
            return;
        }

        let change = ctx.builder.plan_delete(DeleteConfig {
            resource_type: self.resource_type.clone(),
            resource_ref: current.name.clone(),
            resource_id: current.id.clone(),
            namespace: ctx.namespace.to_string(),
            parent: None,
            monikers: BTreeMap::from([(String::from("name"), current.name.clone())]),
        });
        plan.add_change(change);
    }
}

#[async_trait]
impl ResourcePlanner for DeclarativeResourcePlanner {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    async fn plan_changes(&self, ctx: &mut PlanningContext<'_>, plan: &mut Plan) -> Result<()> {
        let current = match ctx.list_managed(&self.resource_type).await {
            Ok(current) => current,
            Err(e) if e.is_not_configured() => {
                debug!("Skipping {}: {e}", self.resource_type);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let resources = ctx.resources;
        let desired: Vec<&DesiredResource> = resources
            .resources_in(&self.resource_type, ctx.namespace)
            .collect();
        debug!(
            "{} in {}: {} declared, {} current",
            self.resource_type,
            ctx.namespace,
            desired.len(),
            current.len()
        );

        for resource in &desired {
            if plan.has_change(&self.resource_type, &resource.reference) {
                continue;
            }
            if let Some(existing) = current.iter().find(|c| is_match(resource, c)) {
                self.plan_update(ctx, plan, resource, existing)?;
                continue;
            }
            // A declared id is authoritative even when the resource is labelled
            // with another namespace
            let adopted = match resource.id.as_deref() {
                Some(id) => match ctx.get(&self.resource_type, id).await {
                    Ok(found) => found,
                    Err(e) if e.is_not_configured() => None,
                    Err(e) => return Err(e.into()),
                },
                None => None,
            };
            match adopted {
                Some(existing) => {
                    debug!(
                        "{} {} found by id in namespace {}",
                        self.resource_type,
                        resource.reference,
                        existing.namespace()
                    );
                    self.plan_update(ctx, plan, resource, &existing)?;
                }
                None => self.plan_create(ctx, plan, resource)?,
            }
        }

        if ctx.mode == PlanMode::Sync {
            for existing in &current {
                let claimed_by_id = resources.resources.iter().any(|d| {
                    d.resource_type == self.resource_type && d.id.as_deref() == Some(existing.id.as_str())
                });
                if !claimed_by_id && !desired.iter().any(|d| is_match(d, existing)) {
                    self.plan_delete(ctx, plan, existing);
                }
            }
        }

        Ok(())
    }
}

fn is_match(desired: &DesiredResource, current: &ManagedResource) -> bool {
    desired
        .id
        .as_deref()
        .map_or(current.name == desired.name, |id| current.id == id)
}

fn parent_info(resources: &ResourceSet, parent: &ParentRef) -> ParentInfo {
    ParentInfo {
        resource_type: parent.resource_type.clone(),
        reference: parent.reference.clone(),
        id: resources
            .get(&parent.resource_type, &parent.reference)
            .and_then(|r| r.id.clone()),
    }
}
