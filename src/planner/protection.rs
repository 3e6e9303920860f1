//! Protection policy.
//!
//! A protected resource may not be updated or deleted. The only permitted
//! update is the one that clears protection; field changes made alongside it
//! are allowed through. Violations are collected for the whole planning pass
//! and reported together.

use tracing::debug;

use crate::error::{ProtectionError, ProtectionViolation};

use super::types::{ActionType, ProtectionChange};

/// Decides whether updates and deletes may proceed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectionValidator;

impl ProtectionValidator {
    /// Checks an update.
    ///
    /// `protection` is the requested status flip, if any.
    ///
    /// # Errors
    ///
    /// Returns the violation when a protected resource would change while
    /// staying protected.
    pub fn check_update(
        resource_type: &str,
        resource_name: &str,
        current_protected: bool,
        protection: Option<ProtectionChange>,
        has_other_changes: bool,
    ) -> Result<(), ProtectionViolation> {
        if !current_protected {
            return Ok(());
        }

        if protection.is_some_and(|p| !p.new) {
            debug!("{resource_type} {resource_name:?} is being unprotected");
            return Ok(());
        }

        if has_other_changes {
            return Err(ProtectionViolation {
                resource_type: resource_type.to_string(),
                resource_name: resource_name.to_string(),
                action: ActionType::Update,
            });
        }

        Ok(())
    }

    /// Checks a delete.
    ///
    /// # Errors
    ///
    /// Returns the violation when the resource is protected.
    pub fn check_delete(
        resource_type: &str,
        resource_name: &str,
        current_protected: bool,
    ) -> Result<(), ProtectionViolation> {
        if current_protected {
            return Err(ProtectionViolation {
                resource_type: resource_type.to_string(),
                resource_name: resource_name.to_string(),
                action: ActionType::Delete,
            });
        }
        Ok(())
    }
}

/// Accumulates protection violations across a planning pass.
#[derive(Debug, Default)]
pub struct ProtectionErrorCollector {
    violations: Vec<ProtectionViolation>,
}

impl ProtectionErrorCollector {
    /// Creates an empty collector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    /// Records a violation.
    pub fn add(&mut self, violation: ProtectionViolation) {
        debug!("Protection violation: {violation}");
        self.violations.push(violation);
    }

    /// Records the outcome of a check. Returns true if the action may proceed.
    pub fn record(&mut self, outcome: Result<(), ProtectionViolation>) -> bool {
        match outcome {
            Ok(()) => true,
            Err(violation) => {
                self.add(violation);
                false
            }
        }
    }

    /// Returns true if any violation was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Recorded violations.
    #[must_use]
    pub fn violations(&self) -> &[ProtectionViolation] {
        &self.violations
    }

    /// Converts the collector into a combined error, if anything was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::Violations`] listing every violation.
    pub fn into_result(self) -> Result<(), ProtectionError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ProtectionError::Violations {
                violations: self.violations,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNPROTECT: ProtectionChange = ProtectionChange { old: true, new: false };
    const PROTECT: ProtectionChange = ProtectionChange { old: false, new: true };

    #[test]
    fn test_unprotected_resources_always_pass() {
        assert!(ProtectionValidator::check_update("api", "a", false, None, true).is_ok());
        assert!(ProtectionValidator::check_update("api", "a", false, Some(PROTECT), true).is_ok());
        assert!(ProtectionValidator::check_delete("api", "a", false).is_ok());
    }

    #[test]
    fn test_protected_noop_passes() {
        assert!(ProtectionValidator::check_update("api", "a", true, None, false).is_ok());
    }

    #[test]
    fn test_protected_field_change_is_rejected() {
        let violation = ProtectionValidator::check_update("api", "a", true, None, true)
            .expect_err("protected resource changed");
        assert_eq!(violation.action, ActionType::Update);
        assert!(ProtectionValidator::check_delete("api", "a", true).is_err());
    }

    #[test]
    fn test_unprotecting_lets_fields_ride_along() {
        assert!(ProtectionValidator::check_update("api", "a", true, Some(UNPROTECT), true).is_ok());
        assert!(ProtectionValidator::check_update("api", "a", true, Some(UNPROTECT), false).is_ok());
    }

    #[test]
    fn test_collector_reports_everything() {
        let mut collector = ProtectionErrorCollector::new();
        assert!(collector.record(Ok(())));
        assert!(!collector.record(ProtectionValidator::check_delete("portal", "p", true)));
        assert!(!collector.record(ProtectionValidator::check_update("api", "a", true, None, true)));
        assert!(collector.has_errors());

        let message = collector.into_result().expect_err("violations").to_string();
        assert!(message.contains("portal \"p\""));
        assert!(message.contains("api \"a\""));
    }

    #[test]
    fn test_empty_collector_is_ok() {
        assert!(ProtectionErrorCollector::new().into_result().is_ok());
    }
}
