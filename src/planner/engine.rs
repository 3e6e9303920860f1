//! Planning pass orchestration.
//!
//! A pass runs in fixed stages: match declared resources to what already
//! exists, let every resource-type planner emit changes per namespace, fail
//! on collected protection violations, resolve forward references, order the
//! batch and finally renumber it. A plan is returned only when every stage
//! succeeds.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::{DesiredResource, ResourceSet};
use crate::error::{ConfigError, ResolveError, Result, StateError};
use crate::state::labels::DEFAULT_NAMESPACE;
use crate::state::{ManagedResource, StateProvider};

use super::builder::ChangeBuilder;
use super::cache::NamespaceCache;
use super::declarative::{DeclarativeResourcePlanner, standard_extractors};
use super::extract::{Accessor, FieldExtractors};
use super::graph::{link_delete_dependencies, resolve_dependencies};
use super::ids::{ChangeIdSequence, renumber};
use super::protection::ProtectionErrorCollector;
use super::resolver::ReferenceResolver;
use super::types::{Plan, PlanMode, default_generator};

/// Planner for one resource type.
///
/// Implementations diff the declared resources of their type against current
/// state and emit changes through the context's builder. Protection
/// violations go to the context's collector instead of failing the pass.
#[async_trait]
pub trait ResourcePlanner: Send + Sync {
    /// Resource type tag this planner handles.
    fn resource_type(&self) -> &str;

    /// Plans the changes for one namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if current state cannot be queried or a change
    /// cannot be built.
    async fn plan_changes(&self, ctx: &mut PlanningContext<'_>, plan: &mut Plan) -> Result<()>;
}

/// Everything a resource-type planner may use during one namespace.
pub struct PlanningContext<'a> {
    provider: &'a dyn StateProvider,
    cache: &'a mut NamespaceCache,
    /// Change builder shared by the whole pass.
    pub builder: ChangeBuilder<'a>,
    /// Protection violations collected so far.
    pub protection: &'a mut ProtectionErrorCollector,
    /// Field accessors for declared resources.
    pub extractors: &'a FieldExtractors<DesiredResource>,
    /// Declared resources, with identities pre-resolved.
    pub resources: &'a ResourceSet,
    /// Namespace being planned.
    pub namespace: &'a str,
    /// Requested mode.
    pub mode: PlanMode,
}

impl PlanningContext<'_> {
    /// Lists managed resources of a type in the current namespace.
    ///
    /// # Errors
    ///
    /// Propagates provider errors, including [`StateError::NotConfigured`].
    pub async fn list_managed(
        &mut self,
        resource_type: &str,
    ) -> std::result::Result<Vec<ManagedResource>, StateError> {
        let namespaces = [self.namespace.to_string()];
        self.cache
            .list_managed(self.provider, resource_type, &namespaces)
            .await
    }

    /// Fetches a resource by remote identifier, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Propagates provider errors.
    pub async fn get(
        &self,
        resource_type: &str,
        id: &str,
    ) -> std::result::Result<Option<ManagedResource>, StateError> {
        self.provider.get(resource_type, id).await
    }
}

/// Options for one planning pass.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Apply (additive) or sync (with deletes).
    pub mode: PlanMode,
    /// Generator identity; falls back to the document default, then to this
    /// crate's name and version.
    pub generator: Option<String>,
}

impl PlanOptions {
    /// Options for the given mode.
    #[must_use]
    pub const fn new(mode: PlanMode) -> Self {
        Self {
            mode,
            generator: None,
        }
    }

    /// Sets the generator identity.
    #[must_use]
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = Some(generator.into());
        self
    }
}

/// The planning engine.
pub struct Planner<P: StateProvider> {
    /// Current-state provider.
    provider: P,
    /// Resource-type planners, run in registration order.
    planners: Vec<Box<dyn ResourcePlanner>>,
    /// Field accessors for declared resources.
    extractors: FieldExtractors<DesiredResource>,
}

impl<P: StateProvider> Planner<P> {
    /// Creates a planner with no resource-type planners registered.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            planners: Vec::new(),
            extractors: standard_extractors(),
        }
    }

    /// Registers a resource-type planner.
    #[must_use]
    pub fn with_planner(mut self, planner: impl ResourcePlanner + 'static) -> Self {
        self.register(Box::new(planner));
        self
    }

    /// Registers a declarative planner for each type not yet handled.
    #[must_use]
    pub fn with_declarative_types<I, S>(mut self, resource_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for resource_type in resource_types {
            let resource_type = resource_type.into();
            if self.handles(&resource_type) {
                continue;
            }
            self.register(Box::new(DeclarativeResourcePlanner::new(resource_type)));
        }
        self
    }

    /// Registers a field accessor used by planners and the resolver.
    #[must_use]
    pub fn with_extractor(
        mut self,
        resource_type: impl Into<String>,
        path: impl Into<String>,
        accessor: Accessor<DesiredResource>,
    ) -> Self {
        self.extractors.register(resource_type, path, accessor);
        self
    }

    /// Registers a boxed resource-type planner.
    pub fn register(&mut self, planner: Box<dyn ResourcePlanner>) {
        debug!("Registered planner for {}", planner.resource_type());
        self.planners.push(planner);
    }

    /// Returns true if a planner for the type is registered.
    #[must_use]
    pub fn handles(&self, resource_type: &str) -> bool {
        self.planners
            .iter()
            .any(|p| p.resource_type() == resource_type)
    }

    /// Returns the current-state provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Generates a plan reconciling `resources` with current state.
    ///
    /// # Errors
    ///
    /// Returns an error if current state cannot be queried, a planner fails,
    /// protected resources would be modified, references cannot be resolved,
    /// or the changes cannot be ordered.
    pub async fn generate_plan(&self, resources: &ResourceSet, options: &PlanOptions) -> Result<Plan> {
        info!(
            "Planning {} resource(s) in {} mode",
            resources.resources.len(),
            options.mode
        );

        let generator = options
            .generator
            .clone()
            .or_else(|| resources.defaults.generator.clone())
            .unwrap_or_else(default_generator);
        let mut plan = Plan::new(options.mode, generator);

        let mut cache = NamespaceCache::new();
        let ids = ChangeIdSequence::new();
        let mut protection = ProtectionErrorCollector::new();

        let mut desired = resources.clone();
        self.resolve_identities(&mut desired, &mut cache).await?;

        for namespace in planning_namespaces(&desired, options.mode) {
            debug!("Planning namespace {namespace}");
            for planner in &self.planners {
                let mut ctx = PlanningContext {
                    provider: &self.provider,
                    cache: &mut cache,
                    builder: ChangeBuilder::new(&ids),
                    protection: &mut protection,
                    extractors: &self.extractors,
                    resources: &desired,
                    namespace: &namespace,
                    mode: options.mode,
                };
                planner.plan_changes(&mut ctx, &mut plan).await?;
            }
        }

        protection.into_result()?;

        let mut changes = std::mem::take(&mut plan.changes);
        let outcome = ReferenceResolver::new(&self.provider, &mut cache, &self.extractors)
            .with_index(&desired)
            .resolve(&mut changes)
            .await?;
        plan.changes = changes;

        if !outcome.errors.is_empty() {
            return Err(ResolveError::Unresolved {
                errors: outcome.errors,
            }
            .into());
        }
        plan.warnings.extend(outcome.warnings);
        plan.update_summary();

        link_delete_dependencies(&mut plan.changes);
        let order = resolve_dependencies(&plan.changes)?;
        let plan = renumber(plan, &order)?;

        info!(
            "Plan ready: {} change(s), {} warning(s)",
            plan.summary.total_changes,
            plan.warnings.len()
        );
        Ok(plan)
    }

    /// Matches declared resources to existing ones, filling in remote ids.
    ///
    /// A declared id must exist; otherwise the resource is looked up by name
    /// within its namespace.
    async fn resolve_identities(
        &self,
        desired: &mut ResourceSet,
        cache: &mut NamespaceCache,
    ) -> Result<()> {
        let mut matched = 0usize;

        for idx in 0..desired.resources.len() {
            let resource = &desired.resources[idx];
            let namespace = desired.namespace_of(resource).to_string();

            if let Some(id) = resource.id.as_deref() {
                match self.provider.get(&resource.resource_type, id).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        return Err(ConfigError::validation(
                            format!(
                                "{} '{}' declares id {id}, which does not exist",
                                resource.resource_type, resource.reference
                            ),
                            format!("{}.{}.id", resource.resource_type, resource.reference),
                        )
                        .into());
                    }
                    Err(e) if e.is_not_configured() => {
                        debug!("{} not configured, keeping declared id", resource.resource_type);
                    }
                    Err(e) => return Err(e.into()),
                }
                continue;
            }

            let existing = match cache.list_all(&self.provider, &resource.resource_type).await {
                Ok(existing) => existing,
                Err(e) if e.is_not_configured() => continue,
                Err(e) => return Err(e.into()),
            };

            if let Some(found) = existing
                .into_iter()
                .find(|r| r.name == resource.name && r.namespace() == namespace)
            {
                debug!(
                    "{} '{}' matches existing {}",
                    resource.resource_type, resource.reference, found.id
                );
                desired.resources[idx].id = Some(found.id);
                matched += 1;
            }
        }

        debug!("Matched {matched} declared resource(s) to current state");
        Ok(())
    }
}

/// Namespaces a pass iterates, sorted.
fn planning_namespaces(resources: &ResourceSet, mode: PlanMode) -> Vec<String> {
    let mut namespaces: BTreeSet<String> = resources.namespaces();
    if mode == PlanMode::Sync {
        namespaces.extend(resources.default_namespaces());
    }
    if namespaces.is_empty() {
        namespaces.insert(DEFAULT_NAMESPACE.to_string());
    }
    namespaces.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParentRef;
    use crate::error::{PlannerError, ProtectionError};
    use crate::planner::hash::PlanHasher;
    use crate::planner::reference::RefPlaceholder;
    use crate::planner::resolver::{LOOKUP_NAME, UNKNOWN_ID};
    use crate::planner::types::{ActionType, Protection, ProtectionChange};
    use crate::planner::value::{Nullable, Value};
    use crate::state::labels::{LABEL_MANAGED, LABEL_NAMESPACE, LABEL_PROTECTED};
    use crate::state::{MockStateProvider, SnapshotStateProvider, StateSnapshot};
    use std::collections::BTreeMap;

    fn managed(id: &str, resource_type: &str, name: &str) -> ManagedResource {
        ManagedResource::new(id, resource_type, name)
            .with_label(LABEL_MANAGED, "true")
            .with_label(LABEL_NAMESPACE, DEFAULT_NAMESPACE)
    }

    fn protected(id: &str, resource_type: &str, name: &str) -> ManagedResource {
        managed(id, resource_type, name).with_label(LABEL_PROTECTED, "true")
    }

    fn described(mut resource: ManagedResource, description: &str) -> ManagedResource {
        resource
            .fields
            .insert(String::from("description"), Value::from(description));
        resource
    }

    fn resource_set(resources: Vec<DesiredResource>) -> ResourceSet {
        ResourceSet {
            resources,
            ..ResourceSet::default()
        }
    }

    fn checkout_scenario() -> ResourceSet {
        let api = DesiredResource::new("api", "checkout", "Checkout API");
        let mut version = DesiredResource::new("api_version", "v1", "v1");
        version.parent = Some(ParentRef {
            resource_type: String::from("api"),
            reference: String::from("checkout"),
        });
        version.fields.insert(
            String::from("api_id"),
            Value::from(RefPlaceholder::new("checkout")),
        );
        resource_set(vec![api, version])
    }

    fn planner_for(
        provider: SnapshotStateProvider,
        resources: &ResourceSet,
    ) -> Planner<SnapshotStateProvider> {
        Planner::new(provider).with_declarative_types(resources.resource_types())
    }

    fn position(plan: &Plan, id: &str) -> usize {
        plan.execution_order
            .iter()
            .position(|o| o == id)
            .expect("id in execution order")
    }

    #[tokio::test]
    async fn test_checkout_scenario() {
        let resources = checkout_scenario();
        let planner = planner_for(SnapshotStateProvider::default(), &resources);

        let plan = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect("plan");

        assert_eq!(plan.changes.len(), 2);
        assert_eq!(plan.execution_order, vec!["1:c:api:checkout", "2:c:api_version:v1"]);

        let version = &plan.changes[1];
        assert_eq!(version.depends_on, vec!["1:c:api:checkout"]);
        let info = &version.references["api_id"];
        assert_eq!(info.id, UNKNOWN_ID);
        assert_eq!(
            info.lookup_fields.get(LOOKUP_NAME).map(String::as_str),
            Some("Checkout API")
        );
        assert_eq!(plan.warnings.len(), 1);
        assert_eq!(plan.warnings[0].change_id, "2:c:api_version:v1");
    }

    #[tokio::test]
    async fn test_ids_follow_execution_order_not_creation_order() {
        let resources = checkout_scenario();
        // Child planner first, so the child draws the lower temporary id
        let planner = Planner::new(SnapshotStateProvider::default())
            .with_declarative_types(["api_version", "api"]);

        let plan = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect("plan");

        assert_eq!(plan.execution_order, vec!["1:c:api:checkout", "2:c:api_version:v1"]);
        assert_eq!(plan.changes[0].id, "1:c:api:checkout");
        assert_eq!(plan.changes[1].depends_on, vec!["1:c:api:checkout"]);
        assert_eq!(plan.warnings[0].change_id, "2:c:api_version:v1");
    }

    #[tokio::test]
    async fn test_planning_is_deterministic() {
        let resources = checkout_scenario();
        let hasher = PlanHasher::new();

        let mut digests = Vec::new();
        let mut orders = Vec::new();
        for _ in 0..2 {
            let planner = planner_for(SnapshotStateProvider::default(), &resources);
            let plan = planner
                .generate_plan(&resources, &PlanOptions::default())
                .await
                .expect("plan");
            digests.push(hasher.hash_plan(&plan));
            orders.push(plan.execution_order);
        }

        assert_eq!(digests[0], digests[1]);
        assert_eq!(orders[0], orders[1]);
    }

    #[tokio::test]
    async fn test_dependencies_precede_dependents() {
        let mut resources = checkout_scenario();
        let mut doc = DesiredResource::new("api_document", "guide", "Guide");
        doc.parent = Some(ParentRef {
            resource_type: String::from("api_version"),
            reference: String::from("v1"),
        });
        resources.resources.insert(0, doc);
        resources
            .resources
            .push(DesiredResource::new("portal", "dev", "Developer Portal"));

        let planner = planner_for(SnapshotStateProvider::default(), &resources);
        let plan = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect("plan");

        assert_eq!(plan.changes.len(), 4);
        for change in &plan.changes {
            for dependency in &change.depends_on {
                assert!(position(&plan, dependency) < position(&plan, &change.id));
            }
        }
        let doc = plan
            .changes
            .iter()
            .find(|c| c.resource_type == "api_document")
            .expect("document change");
        assert!(position(&plan, &doc.id) > position(&plan, "2:c:api_version:v1"));
    }

    #[tokio::test]
    async fn test_existing_parent_id_is_used() {
        let resources = checkout_scenario();
        let provider = SnapshotStateProvider::from_resources(vec![managed("api-1", "api", "Checkout API")]);
        let planner = planner_for(provider, &resources);

        let plan = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect("plan");

        assert_eq!(plan.changes.len(), 1);
        let version = &plan.changes[0];
        assert_eq!(version.id, "1:c:api_version:v1");
        assert_eq!(version.parent.as_ref().and_then(|p| p.id.as_deref()), Some("api-1"));
        assert_eq!(version.references["api_id"].id, "api-1");
        assert!(version.depends_on.is_empty());
        assert!(plan.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_reference_fails_with_one_error() {
        let mut version = DesiredResource::new("api_version", "v1", "v1");
        version
            .fields
            .insert(String::from("api_id"), Value::from(RefPlaceholder::new("ghost")));
        let resources = resource_set(vec![version]);
        let planner = planner_for(SnapshotStateProvider::default(), &resources);

        let err = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect_err("unresolvable reference");

        match err {
            PlannerError::Resolve(ResolveError::Unresolved { errors }) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].change_id, "1:c:api_version:v1");
                assert_eq!(errors[0].field, "api_id");
                assert_eq!(errors[0].reference, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unprotecting_yields_one_update() {
        let mut api = DesiredResource::new("api", "checkout", "Checkout API");
        api.protected = Some(false);
        let resources = resource_set(vec![api]);
        let provider = SnapshotStateProvider::from_resources(vec![protected("api-1", "api", "Checkout API")]);
        let planner = planner_for(provider, &resources);

        let plan = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect("unprotecting is allowed");

        assert_eq!(plan.changes.len(), 1);
        let change = &plan.changes[0];
        assert_eq!(change.action, ActionType::Update);
        assert_eq!(change.resource_id.as_deref(), Some("api-1"));
        assert_eq!(
            change.protection,
            Some(Protection::Change(ProtectionChange { old: true, new: false }))
        );
        assert!(change.fields.is_empty());
        let summary = plan.summary.protection_changes.expect("protection summary");
        assert_eq!(summary.unprotecting, 1);
    }

    #[tokio::test]
    async fn test_unprotecting_lets_field_changes_through() {
        let mut api = DesiredResource::new("api", "checkout", "Checkout API");
        api.protected = Some(false);
        api.description = Nullable::Value(String::from("new"));
        let resources = resource_set(vec![api]);
        let provider = SnapshotStateProvider::from_resources(vec![described(
            protected("api-1", "api", "Checkout API"),
            "old",
        )]);
        let planner = planner_for(provider, &resources);

        let plan = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect("unprotecting is allowed");

        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].fields["description"], Value::from("new"));
        assert!(matches!(plan.changes[0].protection, Some(Protection::Change(_))));
    }

    #[tokio::test]
    async fn test_protected_update_is_rejected() {
        let mut api = DesiredResource::new("api", "checkout", "Checkout API");
        api.protected = Some(true);
        api.description = Nullable::Value(String::from("new"));
        let resources = resource_set(vec![api]);
        let provider = SnapshotStateProvider::from_resources(vec![described(
            protected("api-1", "api", "Checkout API"),
            "old",
        )]);
        let planner = planner_for(provider, &resources);

        let err = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect_err("protected resources are immutable");

        assert!(matches!(err, PlannerError::Protection(_)));
        let message = err.to_string();
        assert!(message.contains("\"Checkout API\""));
        assert!(message.contains("set protected: false"));
    }

    #[tokio::test]
    async fn test_every_violation_is_reported() {
        let mut first = DesiredResource::new("api", "checkout", "Checkout API");
        first.description = Nullable::Value(String::from("new"));
        let mut second = DesiredResource::new("portal", "dev", "Developer Portal");
        second.description = Nullable::Value(String::from("new"));
        let resources = resource_set(vec![first, second]);
        let provider = SnapshotStateProvider::from_resources(vec![
            described(protected("api-1", "api", "Checkout API"), "old"),
            described(protected("portal-1", "portal", "Developer Portal"), "old"),
        ]);
        let planner = planner_for(provider, &resources);

        let err = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect_err("two violations");

        match err {
            PlannerError::Protection(ProtectionError::Violations { violations }) => {
                let names: Vec<&str> = violations.iter().map(|v| v.resource_name.as_str()).collect();
                assert_eq!(names, vec!["Checkout API", "Developer Portal"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_sync_mode_deletes_undeclared_resources() {
        let resources = resource_set(vec![DesiredResource::new("api", "checkout", "Checkout API")]);
        let current = vec![
            managed("api-1", "api", "Checkout API"),
            managed("api-2", "api", "Legacy API"),
        ];

        let apply = planner_for(SnapshotStateProvider::from_resources(current.clone()), &resources)
            .generate_plan(&resources, &PlanOptions::new(PlanMode::Apply))
            .await
            .expect("apply plan");
        assert!(apply.is_empty());

        let sync = planner_for(SnapshotStateProvider::from_resources(current), &resources)
            .generate_plan(&resources, &PlanOptions::new(PlanMode::Sync))
            .await
            .expect("sync plan");
        assert_eq!(sync.execution_order, vec!["1:d:api:Legacy API"]);
        assert!(sync.contains_deletes());
        assert_eq!(sync.changes[0].resource_id.as_deref(), Some("api-2"));
        assert_eq!(
            sync.changes[0].resource_monikers.get("name").map(String::as_str),
            Some("Legacy API")
        );
    }

    #[tokio::test]
    async fn test_auth_strategy_is_deleted_after_its_apis() {
        let resources = resource_set(vec![]);
        let provider = SnapshotStateProvider::from_resources(vec![
            managed("api-1", "api", "Old API"),
            managed("as-1", "application_auth_strategy", "Old AS"),
        ]);
        // Strategy planner first, so its delete is emitted before the api delete
        let planner =
            Planner::new(provider).with_declarative_types(["application_auth_strategy", "api"]);

        let plan = planner
            .generate_plan(&resources, &PlanOptions::new(PlanMode::Sync))
            .await
            .expect("sync plan");

        assert_eq!(
            plan.execution_order,
            vec!["1:d:api:Old API", "2:d:application_auth_strategy:Old AS"]
        );
        let strategy = plan
            .changes
            .iter()
            .find(|c| c.resource_type == "application_auth_strategy")
            .expect("strategy delete");
        assert_eq!(strategy.depends_on, vec!["1:d:api:Old API"]);
    }

    #[tokio::test]
    async fn test_protected_delete_is_rejected() {
        let resources = resource_set(vec![]);
        let provider = SnapshotStateProvider::from_resources(vec![protected("api-9", "api", "Keep Me")]);
        let planner = Planner::new(provider).with_declarative_types(["api"]);

        let err = planner
            .generate_plan(&resources, &PlanOptions::new(PlanMode::Sync))
            .await
            .expect_err("protected delete");
        assert!(err.to_string().contains("cannot be deleted"));
    }

    #[tokio::test]
    async fn test_unconfigured_types_are_skipped() {
        let resources = resource_set(vec![
            DesiredResource::new("api", "checkout", "Checkout API"),
            DesiredResource::new("team", "platform", "Platform"),
        ]);
        let provider = SnapshotStateProvider::new(StateSnapshot {
            configured_types: Some(std::collections::BTreeSet::from([String::from("api")])),
            resources: vec![],
        });
        let planner = planner_for(provider, &resources);

        let plan = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect("plan");
        assert_eq!(plan.execution_order, vec!["1:c:api:checkout"]);
    }

    #[tokio::test]
    async fn test_declared_id_must_exist() {
        let mut api = DesiredResource::new("api", "checkout", "Checkout API");
        api.id = Some(String::from("missing"));
        let resources = resource_set(vec![api]);
        let planner = planner_for(SnapshotStateProvider::default(), &resources);

        let err = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect_err("unknown id");
        assert!(matches!(err, PlannerError::Config(ConfigError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn test_wildcard_listing_is_fetched_once() {
        let mut provider = MockStateProvider::new();
        provider
            .expect_list_managed()
            .withf(|t, ns| t == "portal" && ns == [String::from("*")])
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    ManagedResource::new("p-1", "portal", "Team A Portal")
                        .with_label(LABEL_MANAGED, "true")
                        .with_label(LABEL_NAMESPACE, "team-a"),
                    ManagedResource::new("p-2", "portal", "Team B Portal")
                        .with_label(LABEL_MANAGED, "true")
                        .with_label(LABEL_NAMESPACE, "team-b"),
                ])
            });
        provider.expect_provider_name().return_const("mock");

        let mut portal = DesiredResource::new("portal", "a", "Team A Portal");
        portal.namespace = Some(String::from("team-a"));
        let mut extra = DesiredResource::new("portal", "new", "New Portal");
        extra.namespace = Some(String::from("team-a"));
        let resources = resource_set(vec![portal, extra]);

        let planner = Planner::new(provider).with_declarative_types(["portal"]);
        let plan = planner
            .generate_plan(&resources, &PlanOptions::default())
            .await
            .expect("plan");

        assert_eq!(plan.execution_order, vec!["1:c:portal:new"]);
        assert_eq!(plan.changes[0].namespace, "team-a");
    }

    #[tokio::test]
    async fn test_plan_round_trips_through_json() {
        let mut api = DesiredResource::new("api", "checkout", "Checkout API");
        api.description = Nullable::Value(String::from("Payments"));
        api.labels = Nullable::Value(BTreeMap::from([(String::from("env"), String::from("prod"))]));
        let mut resources = checkout_scenario();
        resources.resources[0] = api;

        let provider = SnapshotStateProvider::from_resources(vec![described(
            managed("api-1", "api", "Checkout API"),
            "Old",
        )]);
        let planner = planner_for(provider, &resources).with_extractor(
            "api_version",
            "version",
            |r| Some(Value::from(r.name.as_str())),
        );
        let plan = planner
            .generate_plan(&resources, &PlanOptions::new(PlanMode::Sync).with_generator("test"))
            .await
            .expect("plan");

        let update = plan
            .changes
            .iter()
            .find(|c| c.action == ActionType::Update)
            .expect("update change");
        assert_eq!(update.fields.len(), 2);
        assert!(update.parent.is_none());
        let child = plan
            .changes
            .iter()
            .find(|c| c.resource_type == "api_version")
            .expect("child change");
        assert!(child.parent.is_some());
        assert_eq!(child.fields["version"], Value::from("v1"));

        let json = serde_json::to_string_pretty(&plan).expect("serialize");
        let restored: Plan = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, plan);
        assert_eq!(PlanHasher::new().hash_plan(&restored), PlanHasher::new().hash_plan(&plan));
    }

    #[test]
    fn test_planning_namespaces() {
        let mut resources = resource_set(vec![]);
        assert_eq!(planning_namespaces(&resources, PlanMode::Apply), vec![DEFAULT_NAMESPACE]);

        resources.defaults.namespaces = vec![String::from("team-z")];
        let mut scoped = DesiredResource::new("api", "a", "A");
        scoped.namespace = Some(String::from("team-a"));
        resources.resources.push(scoped);

        assert_eq!(planning_namespaces(&resources, PlanMode::Apply), vec!["team-a"]);
        assert_eq!(
            planning_namespaces(&resources, PlanMode::Sync),
            vec!["default", "team-a", "team-z"]
        );
    }
}
