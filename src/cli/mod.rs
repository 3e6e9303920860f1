//! CLI module for the declplan planner.
//!
//! This module provides the command-line interface for planning,
//! validating and inspecting change plans.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, ModeArg, OutputFormat};
pub use output::OutputFormatter;
