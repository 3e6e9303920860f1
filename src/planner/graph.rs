//! Dependency graph and execution ordering.
//!
//! Edges come from each change's `depends_on` list plus implicit edges: a
//! change whose reference or parent is still unknown must run after the
//! same-batch create of that resource. The order is computed with Kahn's
//! algorithm; ties between independent changes are broken by insertion
//! order so equivalent plans order identically.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use tracing::debug;

use crate::error::PlanError;

use super::resolver::{UNKNOWN_ID, reference_target_type};
use super::types::{ActionType, Change};
use super::value::Value;

/// Delete changes that must run after deletes of other types: the left type
/// waits for the listed types.
const DELETE_AFTER: &[(&str, &[&str])] = &[("application_auth_strategy", &["api", "api_publication"])];

/// Field of an `api_publication` listing the auth strategies it uses.
const AUTH_STRATEGY_IDS_FIELD: &str = "auth_strategy_ids";

/// Adds delete-before-delete edges that no reference expresses.
///
/// A platform rejects deleting an auth strategy while an api or publication
/// still uses it, so each strategy delete waits on the api and publication
/// deletes of its namespace. When a namespace is unknown on either side, a
/// publication is linked only if its `auth_strategy_ids` name the strategy.
pub fn link_delete_dependencies(changes: &mut [Change]) {
    let mut links: Vec<(usize, String)> = Vec::new();

    for (idx, change) in changes.iter().enumerate() {
        if change.action != ActionType::Delete {
            continue;
        }
        let Some((_, before)) = DELETE_AFTER.iter().find(|(t, _)| *t == change.resource_type) else {
            continue;
        };
        for dependency in changes.iter().filter(|c| {
            c.action == ActionType::Delete
                && before.contains(&c.resource_type.as_str())
                && should_link(change, c)
        }) {
            debug!("Delete ordering: {} after {}", change.id, dependency.id);
            links.push((idx, dependency.id.clone()));
        }
    }

    for (idx, dependency) in links {
        changes[idx].add_dependency(&dependency);
    }
}

fn should_link(delete: &Change, dependency: &Change) -> bool {
    if !delete.namespace.is_empty() && !dependency.namespace.is_empty() {
        return delete.namespace == dependency.namespace;
    }
    if dependency.resource_type == "api_publication" {
        let Some(id) = delete.resource_id.as_deref() else {
            return false;
        };
        return dependency
            .fields
            .get(AUTH_STRATEGY_IDS_FIELD)
            .and_then(Value::as_list)
            .is_some_and(|ids| ids.iter().any(|v| v.as_str() == Some(id)));
    }
    delete.namespace == dependency.namespace
}

/// Computes a dependency-respecting execution order.
///
/// # Errors
///
/// Returns [`PlanError::DuplicateChangeId`] if two changes share an id,
/// [`PlanError::UnknownDependency`] if an explicit dependency names a change
/// outside the batch, and [`PlanError::CircularDependency`] if no order
/// exists.
pub fn resolve_dependencies(changes: &[Change]) -> Result<Vec<String>, PlanError> {
    let n = changes.len();

    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (idx, change) in changes.iter().enumerate() {
        if positions.insert(change.id.as_str(), idx).is_some() {
            return Err(PlanError::DuplicateChangeId {
                id: change.id.clone(),
            });
        }
    }

    let creates: HashMap<(&str, &str), usize> = changes
        .iter()
        .enumerate()
        .filter(|(_, c)| c.action == ActionType::Create)
        .map(|(idx, c)| ((c.resource_type.as_str(), c.resource_ref.as_str()), idx))
        .collect();

    // deps[i] = changes that must run before change i
    let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];

    for (idx, change) in changes.iter().enumerate() {
        for dependency in &change.depends_on {
            let Some(&dep_idx) = positions.get(dependency.as_str()) else {
                return Err(PlanError::UnknownDependency {
                    change_id: change.id.clone(),
                    dependency: dependency.clone(),
                });
            };
            if dep_idx != idx {
                deps[idx].insert(dep_idx);
            }
        }

        for dep_idx in implicit_dependencies(change, changes, &creates) {
            if dep_idx != idx && deps[idx].insert(dep_idx) {
                debug!("Implicit dependency: {} after {}", change.id, changes[dep_idx].id);
            }
        }
    }

    // dependents[i] = changes waiting on change i
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree: Vec<usize> = vec![0; n];
    for (idx, before) in deps.iter().enumerate() {
        for &dep_idx in before {
            dependents[dep_idx].push(idx);
            in_degree[idx] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &next in &dependents[idx] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != n {
        let remaining: Vec<usize> = (0..n).filter(|idx| in_degree[*idx] > 0).collect();
        let change_ids: Vec<String> = remaining.iter().map(|&i| changes[i].id.clone()).collect();
        let details = find_cycle(&deps, &remaining).map_or_else(
            || format!("changes left unordered: {}", change_ids.join(", ")),
            |cycle| {
                cycle
                    .iter()
                    .map(|&i| changes[i].id.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            },
        );
        return Err(PlanError::CircularDependency {
            change_ids,
            details,
        });
    }

    Ok(order.into_iter().map(|idx| changes[idx].id.clone()).collect())
}

/// Same-batch creates a change waits on through unknown references or an
/// unknown parent.
fn implicit_dependencies(
    change: &Change,
    changes: &[Change],
    creates: &HashMap<(&str, &str), usize>,
) -> Vec<usize> {
    let find_create = |resource_type: Option<&str>, reference: &str| -> Option<usize> {
        match resource_type {
            Some(t) => creates.get(&(t, reference)).copied(),
            // An untyped reference only orders against an unambiguous target
            None => {
                let mut matches = changes
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.action == ActionType::Create && c.resource_ref == reference);
                let first = matches.next().map(|(idx, _)| idx);
                if matches.next().is_some() { None } else { first }
            }
        }
    };

    let mut found = Vec::new();
    for (field, info) in &change.references {
        let target_type = reference_target_type(field);
        if info.id == UNKNOWN_ID {
            found.extend(find_create(target_type, &info.reference));
        }
        for (reference, id) in info.refs.iter().zip(&info.resolved_ids) {
            if id == UNKNOWN_ID {
                found.extend(find_create(target_type, reference));
            }
        }
    }

    if let Some(parent) = &change.parent
        && parent.id.is_none()
    {
        found.extend(find_create(Some(&parent.resource_type), &parent.reference));
    }
    found
}

/// Walks the unordered remainder to report one concrete cycle.
fn find_cycle(deps: &[BTreeSet<usize>], remaining: &[usize]) -> Option<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    fn visit(
        node: usize,
        deps: &[BTreeSet<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = Mark::OnStack;
        stack.push(node);
        for &next in &deps[node] {
            match marks[next] {
                Mark::OnStack => {
                    let start = stack.iter().position(|&n| n == next)?;
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(next, deps, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; deps.len()];
    let mut stack = Vec::new();
    for &start in remaining {
        if marks[start] == Mark::Unvisited
            && let Some(cycle) = visit(start, deps, &mut marks, &mut stack)
        {
            return Some(cycle);
        }
    }
    None
}
