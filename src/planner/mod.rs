//! Change planning.
//!
//! This module turns declared resources and current state into an ordered,
//! dependency-resolved [`Plan`]. Resource-type planners emit changes through
//! the [`ChangeBuilder`]; the engine then resolves references, orders the
//! batch and assigns final identifiers.

mod builder;
mod cache;
mod declarative;
mod engine;
mod extract;
mod graph;
mod hash;
mod ids;
mod protection;
mod reference;
mod resolver;
mod types;
mod value;

pub use builder::{ChangeBuilder, CreateConfig, DeleteConfig, UpdateConfig};
pub use cache::{NamespaceCache, WILDCARD_NAMESPACE, normalize_namespaces};
pub use declarative::{Comparator, DeclarativeResourcePlanner, compare_fields, standard_extractors};
pub use engine::{PlanOptions, Planner, PlanningContext, ResourcePlanner};
pub use extract::{ANY_TYPE, Accessor, FieldExtractors};
pub use graph::{link_delete_dependencies, resolve_dependencies};
pub use hash::PlanHasher;
pub use ids::{ChangeId, ChangeIdSequence, renumber};
pub use protection::{ProtectionErrorCollector, ProtectionValidator};
pub use reference::{DEFAULT_REF_FIELD, REF_PLACEHOLDER_PREFIX, RefPlaceholder, looks_like_remote_id};
pub use resolver::{
    LOOKUP_NAME, LOOKUP_NAMES, ReferenceResolver, ResolveOutcome, ResourceIndex, UNKNOWN_ID,
    reference_target_type,
};
pub use types::{
    ActionType, Change, PLAN_FORMAT_VERSION, ParentInfo, Plan, PlanMetadata, PlanMode, PlanSummary,
    PlanWarning, Protection, ProtectionChange, ProtectionSummary, ReferenceInfo, default_generator,
};
pub use value::{FieldMap, Nullable, Value, field_at_path};
