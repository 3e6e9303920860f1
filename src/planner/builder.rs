//! Generic change builder.
//!
//! Resource-type planners describe what they decided in resource-agnostic
//! terms and the builder turns that into a uniform [`Change`]. Every built
//! change draws a temporary identifier from the pass's [`ChangeIdSequence`].

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ConfigError;

use super::ids::ChangeIdSequence;
use super::types::{ActionType, Change, ParentInfo, Protection, ProtectionChange};
use super::value::FieldMap;

/// Inputs for a create change.
#[derive(Debug, Clone, Default)]
pub struct CreateConfig {
    /// Resource type tag.
    pub resource_type: String,
    /// Declarative reference.
    pub resource_ref: String,
    /// Namespace of the resource.
    pub namespace: String,
    /// Field keys the extracted map must contain.
    pub required_fields: Vec<String>,
    /// Protection status of the new resource, when declared.
    pub protected: Option<bool>,
    /// Parent resource, for child resources.
    pub parent: Option<ParentInfo>,
    /// Identifiers of changes that must run first.
    pub depends_on: Vec<String>,
}

/// Inputs for an update change.
#[derive(Debug, Clone, Default)]
pub struct UpdateConfig {
    /// Resource type tag.
    pub resource_type: String,
    /// Declarative reference.
    pub resource_ref: String,
    /// Remote identifier of the existing resource.
    pub resource_id: String,
    /// Namespace of the resource.
    pub namespace: String,
    /// Fields whose value changes.
    pub changed_fields: FieldMap,
    /// Field keys the changed map must contain.
    pub required_fields: Vec<String>,
    /// Requested protection flip, if any.
    pub protection: Option<ProtectionChange>,
    /// Parent resource, for child resources.
    pub parent: Option<ParentInfo>,
    /// Identifiers of changes that must run first.
    pub depends_on: Vec<String>,
}

/// Inputs for a delete change.
#[derive(Debug, Clone, Default)]
pub struct DeleteConfig {
    /// Resource type tag.
    pub resource_type: String,
    /// Declarative reference (the current name when no declaration exists).
    pub resource_ref: String,
    /// Remote identifier of the resource to delete.
    pub resource_id: String,
    /// Namespace of the resource.
    pub namespace: String,
    /// Parent resource, for child resources.
    pub parent: Option<ParentInfo>,
    /// Human-readable identifiers of the resource.
    pub monikers: BTreeMap<String, String>,
}

/// Builds changes for one planning pass.
#[derive(Debug, Clone, Copy)]
pub struct ChangeBuilder<'a> {
    ids: &'a ChangeIdSequence,
}

impl<'a> ChangeBuilder<'a> {
    /// Creates a builder drawing identifiers from `ids`.
    #[must_use]
    pub const fn new(ids: &'a ChangeIdSequence) -> Self {
        Self { ids }
    }

    /// Builds a create change from the fields `extract` produces.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if a required field is
    /// absent from the extracted map.
    pub fn plan_create(
        &self,
        config: CreateConfig,
        extract: impl FnOnce() -> FieldMap,
    ) -> Result<Change, ConfigError> {
        let fields = extract();
        check_required(&config.resource_type, &config.resource_ref, &config.required_fields, &fields)?;

        let id = self
            .ids
            .next_id(ActionType::Create, &config.resource_type, &config.resource_ref);
        debug!("Planned create {id}");

        Ok(Change {
            id,
            resource_type: config.resource_type,
            resource_ref: config.resource_ref,
            resource_id: None,
            resource_monikers: BTreeMap::new(),
            action: ActionType::Create,
            fields,
            references: BTreeMap::new(),
            parent: config.parent,
            protection: config.protected.map(Protection::Flag),
            namespace: config.namespace,
            depends_on: config.depends_on,
        })
    }

    /// Builds an update change.
    ///
    /// When the protection status flips, the result is a protection-flip
    /// change with the changed fields folded into it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if a required field is
    /// absent from the changed map.
    pub fn plan_update(&self, config: UpdateConfig) -> Result<Change, ConfigError> {
        check_required(
            &config.resource_type,
            &config.resource_ref,
            &config.required_fields,
            &config.changed_fields,
        )?;

        let protection = config
            .protection
            .filter(ProtectionChange::is_flip)
            .map(Protection::Change);

        let id = self
            .ids
            .next_id(ActionType::Update, &config.resource_type, &config.resource_ref);
        if protection.is_some() {
            debug!(
                "Planned protection change {id} with {} folded field(s)",
                config.changed_fields.len()
            );
        } else {
            debug!("Planned update {id}: {} field(s)", config.changed_fields.len());
        }

        Ok(Change {
            id,
            resource_type: config.resource_type,
            resource_ref: config.resource_ref,
            resource_id: Some(config.resource_id),
            resource_monikers: BTreeMap::new(),
            action: ActionType::Update,
            fields: config.changed_fields,
            references: BTreeMap::new(),
            parent: config.parent,
            protection,
            namespace: config.namespace,
            depends_on: config.depends_on,
        })
    }

    /// Builds a protection-flip change with no other field changes.
    #[must_use]
    pub fn plan_protection_change(
        &self,
        resource_type: &str,
        resource_ref: &str,
        resource_id: &str,
        namespace: &str,
        protection: ProtectionChange,
    ) -> Change {
        let id = self
            .ids
            .next_id(ActionType::Update, resource_type, resource_ref);
        debug!("Planned protection change {id}: {} -> {}", protection.old, protection.new);

        Change {
            id,
            resource_type: resource_type.to_string(),
            resource_ref: resource_ref.to_string(),
            resource_id: Some(resource_id.to_string()),
            resource_monikers: BTreeMap::new(),
            action: ActionType::Update,
            fields: FieldMap::new(),
            references: BTreeMap::new(),
            parent: None,
            protection: Some(Protection::Change(protection)),
            namespace: namespace.to_string(),
            depends_on: Vec::new(),
        }
    }

    /// Builds a delete change.
    #[must_use]
    pub fn plan_delete(&self, config: DeleteConfig) -> Change {
        let id = self
            .ids
            .next_id(ActionType::Delete, &config.resource_type, &config.resource_ref);
        debug!("Planned delete {id}");

        Change {
            id,
            resource_type: config.resource_type,
            resource_ref: config.resource_ref,
            resource_id: Some(config.resource_id),
            resource_monikers: config.monikers,
            action: ActionType::Delete,
            fields: FieldMap::new(),
            references: BTreeMap::new(),
            parent: config.parent,
            protection: None,
            namespace: config.namespace,
            depends_on: Vec::new(),
        }
    }
}

fn check_required(
    resource_type: &str,
    resource_ref: &str,
    required: &[String],
    fields: &FieldMap,
) -> Result<(), ConfigError> {
    match required.iter().find(|key| !fields.contains_key(key.as_str())) {
        Some(field) => Err(ConfigError::MissingRequiredField {
            resource_type: resource_type.to_string(),
            resource_ref: resource_ref.to_string(),
            field: field.clone(),
        }),
        None => Ok(()),
    }
}
