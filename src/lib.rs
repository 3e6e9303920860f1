// ============================================================================
// Linting
// ============================================================================

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(unused_must_use)]
#![deny(nonstandard_style)]

// Clippy lints (warnings only)
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::print_stdout)]
#![warn(clippy::todo)]
#![warn(clippy::unimplemented)]
#![warn(clippy::redundant_clone)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # declplan
//!
//! A deterministic change planner for declarative infrastructure.
//!
//! ## Overview
//!
//! declplan compares a declared set of resources with the current state of a
//! remote platform and produces a [`Plan`]: an ordered list of create, update
//! and delete changes that an executor can apply without further lookups.
//!
//! - Cross-resource references (`__REF__:<name>`) are resolved to remote
//!   identifiers, or to an unknown marker with lookup hints when the target
//!   is created in the same plan
//! - Changes are ordered so that every dependency runs first
//! - Protected resources cannot be updated or deleted unless the same plan
//!   turns their protection off
//! - Change identifiers are renumbered to follow execution order, so the
//!   same inputs always produce the same plan
//!
//! ## Modules
//!
//! - [`config`]: Desired-state document parsing and validation
//! - [`state`]: Current-state provider interface and snapshot provider
//! - [`planner`]: Change building, reference resolution, ordering and protection
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! defaults:
//!   namespace: payments
//!
//! resources:
//!   - type: api
//!     ref: checkout
//!     name: Checkout API
//!     protected: true
//!
//!   - type: api_version
//!     ref: v1
//!     name: v1
//!     parent:
//!       type: api
//!       ref: checkout
//!     fields:
//!       api_id: "__REF__:checkout"
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ConfigParser, ConfigValidator, DesiredResource, ResourceSet};
pub use error::{PlannerError, Result};
pub use planner::{Change, Plan, PlanHasher, PlanMode, PlanOptions, Planner, ResourcePlanner};
pub use state::{ManagedResource, SnapshotStateProvider, StateProvider};
