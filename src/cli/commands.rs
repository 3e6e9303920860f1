//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::planner::PlanMode;

/// declplan - deterministic change planning for declarative infrastructure.
#[derive(Parser, Debug)]
#[command(name = "declplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the desired-state document.
    #[arg(short = 'f', long = "file", global = true, env = "DECLPLAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a plan from the desired state and a current-state snapshot.
    Plan {
        /// Current-state snapshot (JSON or YAML). Empty state when omitted.
        #[arg(short, long, env = "DECLPLAN_STATE")]
        state: Option<PathBuf>,

        /// Planning mode.
        #[arg(long, default_value = "apply")]
        mode: ModeArg,

        /// Generator identity recorded in the plan.
        #[arg(long)]
        generator: Option<String>,

        /// Write the plan document to this file.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate the desired-state document.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Load a saved plan, verify it round-trips and display it.
    Show {
        /// Plan document to load.
        plan: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines.
    #[default]
    Text,
    /// One JSON object per log event.
    Json,
}

/// Planning mode argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// Create and update only.
    #[default]
    Apply,
    /// Also delete managed resources that are no longer declared.
    Sync,
}

impl From<ModeArg> for PlanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Apply => Self::Apply,
            ModeArg::Sync => Self::Sync,
        }
    }
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_command() {
        let cli = Cli::try_parse_from([
            "declplan",
            "plan",
            "-f",
            "declplan.yaml",
            "-s",
            "state.json",
            "--mode",
            "sync",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("declplan.yaml")));
        match cli.command {
            Commands::Plan { state, mode, .. } => {
                assert_eq!(state, Some(PathBuf::from("state.json")));
                assert_eq!(PlanMode::from(mode), PlanMode::Sync);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_show_command() {
        let cli = Cli::try_parse_from(["declplan", "--log-format", "json", "show", "plan.json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Show { .. }));
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        assert!(Cli::try_parse_from(["declplan", "plan", "--mode", "destroy"]).is_err());
    }
}
