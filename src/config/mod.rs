//! Desired-state configuration.
//!
//! This module handles everything about the declared side of a plan:
//! - The `declplan.yaml` document types
//! - Parsing with environment overrides
//! - Validation before planning

mod parser;
mod spec;
mod validator;

pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_DEFAULT_NAMESPACE, ENV_GENERATOR, find_config_file,
};
pub use spec::{Defaults, DesiredResource, ParentRef, ResourceSet};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
