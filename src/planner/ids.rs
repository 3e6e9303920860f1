//! Change identifiers.
//!
//! Changes are built with temporary identifiers drawn from a
//! [`ChangeIdSequence`]. Once the execution order is known, [`renumber`]
//! rewrites every identifier to encode its 1-based execution position and
//! updates every cross-reference in the plan to match.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::PlanError;

use super::types::{ActionType, Change, Plan};

/// Monotonic, thread-safe source of temporary change identifiers.
///
/// One sequence is owned by each planning pass.
#[derive(Debug)]
pub struct ChangeIdSequence {
    next: AtomicU64,
}

impl Default for ChangeIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeIdSequence {
    /// Creates a sequence starting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Consumes one tick and formats a temporary identifier.
    pub fn next_id(&self, action: ActionType, resource_type: &str, resource_ref: &str) -> String {
        let counter = self.next.fetch_add(1, Ordering::Relaxed);
        ChangeId {
            position: counter,
            action,
            resource_type: resource_type.to_string(),
            resource_ref: resource_ref.to_string(),
        }
        .to_string()
    }

    /// Number of identifiers issued so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

/// Parsed form of `<n>:<action-letter>:<type>:<ref>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeId {
    /// Counter value or execution position.
    pub position: u64,
    /// Action encoded by the letter.
    pub action: ActionType,
    /// Resource type tag.
    pub resource_type: String,
    /// Declarative reference; may itself contain `:`.
    pub resource_ref: String,
}

impl ChangeId {
    /// Parses a change identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidChangeId`] if the identifier is malformed.
    pub fn parse(id: &str) -> Result<Self, PlanError> {
        let invalid = || PlanError::InvalidChangeId { id: id.to_string() };

        let mut parts = id.splitn(4, ':');
        let position = parts
            .next()
            .and_then(|p| p.parse::<u64>().ok())
            .ok_or_else(invalid)?;

        let mut letter = parts.next().ok_or_else(invalid)?.chars();
        let action = match (letter.next(), letter.next()) {
            (Some(c), None) => ActionType::from_letter(c).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };

        let resource_type = parts.next().filter(|t| !t.is_empty()).ok_or_else(invalid)?;
        let resource_ref = parts.next().ok_or_else(invalid)?;

        Ok(Self {
            position,
            action,
            resource_type: resource_type.to_string(),
            resource_ref: resource_ref.to_string(),
        })
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.position,
            self.action.letter(),
            self.resource_type,
            self.resource_ref
        )
    }
}

/// Rewrites temporary identifiers to execution-position identifiers.
///
/// `order` must list every change of `plan` exactly once. The returned plan
/// holds its changes in execution order; every `depends_on` entry, the
/// execution order and every warning back-reference use the new identifiers.
///
/// # Errors
///
/// Returns an error if `order` does not cover the plan exactly, if an
/// identifier is malformed, or if a dependency or warning names a change
/// outside the plan.
pub fn renumber(plan: Plan, order: &[String]) -> Result<Plan, PlanError> {
    let Plan {
        metadata,
        changes,
        warnings,
        ..
    } = plan;

    let expected = changes.len();
    let mut by_id: HashMap<String, Change> = HashMap::with_capacity(expected);
    for change in changes {
        if by_id.contains_key(&change.id) {
            return Err(PlanError::DuplicateChangeId { id: change.id });
        }
        by_id.insert(change.id.clone(), change);
    }

    let mut seen = HashSet::with_capacity(order.len());
    for id in order {
        if !seen.insert(id.as_str()) {
            return Err(PlanError::DuplicateChangeId { id: id.clone() });
        }
    }
    let found = order.iter().filter(|id| by_id.contains_key(*id)).count();
    if found != expected || order.len() != expected {
        return Err(PlanError::IncompleteExecutionOrder { expected, found });
    }

    let mut mapping: HashMap<&str, String> = HashMap::with_capacity(expected);
    for (position, old) in (1_u64..).zip(order) {
        let mut parsed = ChangeId::parse(old)?;
        parsed.position = position;
        mapping.insert(old.as_str(), parsed.to_string());
    }

    let mut renumbered = Vec::with_capacity(expected);
    for old in order {
        let Some(mut change) = by_id.remove(old) else {
            return Err(PlanError::IncompleteExecutionOrder { expected, found });
        };
        let mut depends_on = Vec::with_capacity(change.depends_on.len());
        for dependency in &change.depends_on {
            let new = mapping
                .get(dependency.as_str())
                .ok_or_else(|| PlanError::UnknownDependency {
                    change_id: change.id.clone(),
                    dependency: dependency.clone(),
                })?;
            depends_on.push(new.clone());
        }
        change.depends_on = depends_on;
        change.id = mapping
            .get(old.as_str())
            .cloned()
            .ok_or_else(|| PlanError::InvalidChangeId { id: old.clone() })?;
        renumbered.push(change);
    }

    let warnings = warnings
        .into_iter()
        .map(|mut warning| {
            warning.change_id = mapping
                .get(warning.change_id.as_str())
                .cloned()
                .ok_or_else(|| PlanError::InvalidChangeId {
                    id: warning.change_id.clone(),
                })?;
            Ok(warning)
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    let mut result = Plan {
        metadata,
        execution_order: renumbered.iter().map(|c| c.id.clone()).collect(),
        changes: renumbered,
        summary: Default::default(),
        warnings,
    };
    result.update_summary();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::types::PlanMode;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn change(id: &str, depends_on: &[&str]) -> Change {
        let parsed = ChangeId::parse(id).expect("valid id");
        Change {
            id: id.to_string(),
            resource_type: parsed.resource_type,
            resource_ref: parsed.resource_ref,
            resource_id: None,
            resource_monikers: BTreeMap::new(),
            action: parsed.action,
            fields: BTreeMap::new(),
            references: BTreeMap::new(),
            parent: None,
            protection: None,
            namespace: String::new(),
            depends_on: depends_on.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let ids = ChangeIdSequence::new();
        assert_eq!(ids.next_id(ActionType::Create, "api", "checkout"), "1:c:api:checkout");
        assert_eq!(ids.next_id(ActionType::Delete, "portal", "dev"), "2:d:portal:dev");
        assert_eq!(ids.issued(), 2);

        let independent = ChangeIdSequence::new();
        assert_eq!(independent.next_id(ActionType::Update, "api", "x"), "1:u:api:x");
    }

    #[test]
    fn test_sequence_is_thread_safe() {
        let ids = Arc::new(ChangeIdSequence::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| ids.next_id(ActionType::Create, "api", "a"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread finished"))
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 100);
    }

    #[test]
    fn test_parse_keeps_colons_in_ref() {
        let id = ChangeId::parse("12:u:gateway_service:cp:svc").expect("valid id");
        assert_eq!(id.position, 12);
        assert_eq!(id.action, ActionType::Update);
        assert_eq!(id.resource_type, "gateway_service");
        assert_eq!(id.resource_ref, "cp:svc");
        assert_eq!(id.to_string(), "12:u:gateway_service:cp:svc");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "x:c:api:a", "1:z:api:a", "1:cc:api:a", "1:c::a", "1:c:api"] {
            assert!(ChangeId::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_renumber_rewrites_every_reference() {
        let mut plan = Plan::new(PlanMode::Apply, "test");
        plan.add_change(change("1:c:api_version:v1", &["2:c:api:checkout"]));
        plan.add_change(change("2:c:api:checkout", &[]));
        plan.add_warning("1:c:api_version:v1", "resolved during execution");

        let order = vec![
            String::from("2:c:api:checkout"),
            String::from("1:c:api_version:v1"),
        ];
        let plan = renumber(plan, &order).expect("renumbered");

        assert_eq!(plan.execution_order, vec!["1:c:api:checkout", "2:c:api_version:v1"]);
        assert_eq!(plan.changes[0].id, "1:c:api:checkout");
        assert_eq!(plan.changes[1].id, "2:c:api_version:v1");
        assert_eq!(plan.changes[1].depends_on, vec!["1:c:api:checkout"]);
        assert_eq!(plan.warnings[0].change_id, "2:c:api_version:v1");
        assert_eq!(plan.summary.total_changes, 2);
    }

    #[test]
    fn test_renumber_rejects_incomplete_order() {
        let mut plan = Plan::new(PlanMode::Apply, "test");
        plan.add_change(change("1:c:api:a", &[]));
        plan.add_change(change("2:c:api:b", &[]));

        let err = renumber(plan, &[String::from("1:c:api:a")]).expect_err("incomplete order");
        assert!(matches!(
            err,
            PlanError::IncompleteExecutionOrder { expected: 2, found: 1 }
        ));
    }

    #[test]
    fn test_renumber_rejects_dangling_dependency() {
        let mut plan = Plan::new(PlanMode::Apply, "test");
        plan.add_change(change("1:c:api:a", &["9:c:api:ghost"]));

        let err = renumber(plan, &[String::from("1:c:api:a")]).expect_err("dangling dependency");
        assert!(matches!(err, PlanError::UnknownDependency { .. }));
    }
}
