//! Current-state access for the declplan planner.
//!
//! This module provides the provider interface the planner reads current
//! resources through, the managed resource type, the management label
//! conventions, and a snapshot-file provider.

pub mod labels;
mod provider;
mod snapshot;
mod types;

pub use provider::StateProvider;
#[cfg(test)]
pub use provider::MockStateProvider;
pub use snapshot::{SnapshotStateProvider, StateSnapshot};
pub use types::ManagedResource;
