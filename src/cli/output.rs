//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans and
//! validation results in text or JSON.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::planner::{ActionType, Change, Plan, PlanHasher, Protection};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Change")]
    id: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Protection")]
    protection: String,
    #[tabled(rename = "Depends on")]
    depends_on: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a plan together with its digest.
    #[must_use]
    pub fn format_plan(&self, plan: &Plan, digest: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson { digest, plan }).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan, digest),
        }
    }

    fn format_plan_text(plan: &Plan, digest: &str) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "\nPlan ({}) by {} at {}",
            plan.metadata.mode.to_string().bold(),
            plan.metadata.generator,
            plan.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(output, "   Digest: {}\n", PlanHasher::new().short_hash(digest));

        if plan.is_empty() {
            let _ = writeln!(
                output,
                "{} No changes required - current state matches the declaration.",
                "✓".green()
            );
            return output;
        }

        // Rows follow the execution order, falling back to list order
        let ordered: Vec<&Change> = if plan.execution_order.is_empty() {
            plan.changes.iter().collect()
        } else {
            plan.execution_order
                .iter()
                .filter_map(|id| plan.change(id))
                .collect()
        };

        let rows: Vec<ChangeRow> = ordered
            .iter()
            .enumerate()
            .map(|(i, c)| ChangeRow {
                index: i + 1,
                action: Self::format_action_type(c.action),
                id: Self::truncate(&c.id, 48),
                namespace: c.namespace.clone(),
                protection: Self::format_protection(c.protection),
                depends_on: c.depends_on.join(", "),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let count = |action: ActionType| {
            plan.summary
                .by_action
                .get(action.as_str())
                .copied()
                .unwrap_or_default()
        };

        let _ = writeln!(
            output,
            "\nPlan: {} to create, {} to update, {} to destroy",
            count(ActionType::Create).to_string().green(),
            count(ActionType::Update).to_string().yellow(),
            count(ActionType::Delete).to_string().red()
        );

        if let Some(protection) = plan.summary.protection_changes {
            let _ = writeln!(
                output,
                "Protection: {} protecting, {} unprotecting",
                protection.protecting, protection.unprotecting
            );
        }

        if !plan.warnings.is_empty() {
            let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
            for warning in &plan.warnings {
                let _ = writeln!(output, "   - {}: {}", warning.change_id, warning.message);
            }
        }

        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&ValidationJson::new(result, show_warnings))
                .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();

                if result.is_valid() {
                    let _ = writeln!(output, "{} Desired state is valid", "✓".green());
                } else {
                    let _ = writeln!(
                        output,
                        "{} Desired state has {} error(s):",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                } else if result.warning_count() > 0 {
                    let _ = writeln!(
                        output,
                        "   ({} warning(s), use --warnings to show)",
                        result.warning_count()
                    );
                }

                output
            }
        }
    }

    /// Formats a one-line success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Text => format!("{} {message}", "✓".green()),
            OutputFormat::Json => serde_json::json!({ "status": "ok", "message": message }).to_string(),
        }
    }

    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Create => "+create".green().to_string(),
            ActionType::Update => "~update".yellow().to_string(),
            ActionType::Delete => "-delete".red().to_string(),
        }
    }

    fn format_protection(protection: Option<Protection>) -> String {
        match protection {
            Some(Protection::Flag(true)) => String::from("protected"),
            Some(Protection::Change(flip)) if flip.is_flip() => {
                if flip.new {
                    String::from("protect")
                } else {
                    "unprotect".yellow().to_string()
                }
            }
            _ => String::new(),
        }
    }

    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

/// JSON envelope for a plan.
#[derive(Serialize)]
struct PlanJson<'a> {
    digest: &'a str,
    plan: &'a Plan,
}

/// JSON representation of a validation result.
#[derive(Serialize)]
struct ValidationJson<'a> {
    valid: bool,
    errors: Vec<ValidationErrorJson<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<&'a str>,
}

#[derive(Serialize)]
struct ValidationErrorJson<'a> {
    field: &'a str,
    message: &'a str,
}

impl<'a> ValidationJson<'a> {
    fn new(result: &'a ValidationResult, show_warnings: bool) -> Self {
        Self {
            valid: result.is_valid(),
            errors: result
                .errors
                .iter()
                .map(|e| ValidationErrorJson {
                    field: &e.field,
                    message: &e.message,
                })
                .collect(),
            warnings: if show_warnings {
                result.warnings.iter().map(String::as_str).collect()
            } else {
                Vec::new()
            },
        }
    }
}
