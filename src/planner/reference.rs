//! Forward-reference placeholders.
//!
//! A resource-type planner that needs to point at another declarative
//! resource before its remote identity is known embeds a placeholder string
//! of the form `__REF__:<ref>#<field>` in a field value. The reference
//! resolver consumes these placeholders.

use std::fmt;
use uuid::Uuid;

/// Prefix marking a serialized reference placeholder.
pub const REF_PLACEHOLDER_PREFIX: &str = "__REF__:";

/// Field targeted when a placeholder does not name one.
pub const DEFAULT_REF_FIELD: &str = "id";

/// A forward reference to another declaratively-named resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefPlaceholder {
    /// Declarative reference name of the target resource.
    pub reference: String,
    /// Field of the target to read (defaults to the remote identifier).
    pub field: String,
}

impl RefPlaceholder {
    /// Creates a placeholder targeting the remote identifier of `reference`.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            field: String::from(DEFAULT_REF_FIELD),
        }
    }

    /// Creates a placeholder targeting a specific field of `reference`.
    #[must_use]
    pub fn with_field(reference: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            field: field.into(),
        }
    }

    /// Returns true if the string carries the placeholder prefix.
    #[must_use]
    pub fn is_placeholder(value: &str) -> bool {
        value.starts_with(REF_PLACEHOLDER_PREFIX)
    }

    /// Parses a placeholder string.
    ///
    /// Returns `None` when the prefix is missing, the reference is empty, or a
    /// `#` separator is followed by nothing.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let body = value.strip_prefix(REF_PLACEHOLDER_PREFIX)?;
        let (reference, field) = match body.split_once('#') {
            Some((reference, field)) => (reference, field),
            None => (body, DEFAULT_REF_FIELD),
        };

        if reference.is_empty() || field.is_empty() {
            return None;
        }

        Some(Self::with_field(reference, field))
    }

    /// Returns true if the placeholder reads the target's remote identifier.
    #[must_use]
    pub fn targets_id(&self) -> bool {
        self.field.eq_ignore_ascii_case(DEFAULT_REF_FIELD)
    }
}

impl fmt::Display for RefPlaceholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{REF_PLACEHOLDER_PREFIX}{}#{}", self.reference, self.field)
    }
}

/// Returns true if the value already has the shape of a remote identifier.
#[must_use]
pub fn looks_like_remote_id(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_field() {
        let placeholder = RefPlaceholder::parse("__REF__:checkout#name").expect("valid placeholder");
        assert_eq!(placeholder.reference, "checkout");
        assert_eq!(placeholder.field, "name");
        assert!(!placeholder.targets_id());
    }

    #[test]
    fn test_parse_defaults_to_id() {
        let placeholder = RefPlaceholder::parse("__REF__:checkout").expect("valid placeholder");
        assert_eq!(placeholder.field, DEFAULT_REF_FIELD);
        assert!(placeholder.targets_id());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(RefPlaceholder::parse("checkout#id").is_none());
        assert!(RefPlaceholder::parse("__REF__:#id").is_none());
        assert!(RefPlaceholder::parse("__REF__:checkout#").is_none());
    }

    #[test]
    fn test_display_matches_wire_format() {
        let placeholder = RefPlaceholder::new("checkout");
        assert_eq!(placeholder.to_string(), "__REF__:checkout#id");
    }

    #[test]
    fn test_remote_id_shape() {
        assert!(looks_like_remote_id("3f0c2a4e-9d3b-4c51-8a0e-2f6d1b7c9e10"));
        assert!(!looks_like_remote_id("checkout"));
        assert!(!looks_like_remote_id(""));
    }
}
