//! Desired-state document parser.
//!
//! This module loads `declplan.yaml` documents and applies environment
//! overrides to the document defaults.

use crate::error::{ConfigError, PlannerError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::ResourceSet;

/// Overrides `defaults.namespace`.
pub const ENV_DEFAULT_NAMESPACE: &str = "DECLPLAN_DEFAULT_NAMESPACE";

/// Overrides `defaults.generator`.
pub const ENV_GENERATOR: &str = "DECLPLAN_GENERATOR";

/// Parser for desired-state documents.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for locating the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory the `.env` file is read from.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a document from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ResourceSet> {
        let path = path.as_ref();
        info!("Loading desired state from: {}", path.display());

        if !path.exists() {
            return Err(PlannerError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PlannerError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a document from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ResourceSet> {
        debug!("Parsing YAML desired state");

        let resources: ResourceSet = serde_yaml::from_str(content).map_err(|e| {
            PlannerError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source
                    .map(|p| p.display().to_string())
                    .or_else(|| e.location().map(|l| format!("line {}, column {}", l.line(), l.column()))),
            })
        })?;

        debug!("Parsed {} declared resource(s)", resources.resources.len());
        Ok(resources)
    }

    /// Loads a document and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ResourceSet> {
        let mut resources = self.load_file(path)?;
        Self::apply_env_overrides(&mut resources);
        Ok(resources)
    }

    /// Applies `DECLPLAN_*` environment overrides to the document defaults.
    pub fn apply_env_overrides(resources: &mut ResourceSet) {
        Self::apply_overrides(resources, |key| std::env::var(key).ok());
    }

    /// Applies overrides read through `lookup`.
    pub fn apply_overrides(resources: &mut ResourceSet, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(namespace) = lookup(ENV_DEFAULT_NAMESPACE).filter(|v| !v.trim().is_empty()) {
            debug!("Overriding defaults.namespace from environment");
            resources.defaults.namespace = Some(namespace);
        }

        if let Some(generator) = lookup(ENV_GENERATOR).filter(|v| !v.trim().is_empty()) {
            debug!("Overriding defaults.generator from environment");
            resources.defaults.generator = Some(generator);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                PlannerError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default document file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["declplan.yaml", "declplan.yml"];

/// Finds the desired-state document in a directory or its parents.
///
/// # Errors
///
/// Returns an error if no document is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found desired-state document: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(PlannerError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{Nullable, RefPlaceholder, Value};
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_document() {
        let yaml = r"
resources:
  - type: portal
    ref: dev
    name: Developer Portal
";
        let parser = ConfigParser::new();
        let resources = parser.parse_yaml(yaml, None).unwrap();

        assert_eq!(resources.resources.len(), 1);
        assert_eq!(resources.resources[0].reference, "dev");
        assert!(resources.resources[0].description.is_absent());
        assert_eq!(resources.default_namespace(), "default");
    }

    #[test]
    fn test_parse_full_document() {
        let yaml = r#"
defaults:
  namespace: team-a
  namespaces: [team-b]
resources:
  - type: api
    ref: checkout
    name: Checkout API
    protected: true
    description: null
    labels:
      env: prod
  - type: api_version
    ref: v1
    name: v1
    namespace: team-b
    parent:
      type: api
      ref: checkout
    fields:
      api_id: "__REF__:checkout"
      version: "1.0.0"
"#;
        let parser = ConfigParser::new();
        let resources = parser.parse_yaml(yaml, None).unwrap();

        let api = &resources.resources[0];
        assert!(api.is_protected());
        assert_eq!(api.description, Nullable::Null);
        assert_eq!(api.labels.as_option().map(|l| l["env"].as_str()), Some("prod"));

        let version = &resources.resources[1];
        assert_eq!(resources.namespace_of(version), "team-b");
        assert_eq!(version.parent.as_ref().unwrap().reference, "checkout");
        assert_eq!(
            version.fields["api_id"],
            Value::Reference(RefPlaceholder::new("checkout"))
        );
    }

    #[test]
    fn test_parse_error_is_reported() {
        let parser = ConfigParser::new();
        let err = parser.parse_yaml("resources: [", None).unwrap_err();
        assert!(matches!(err, PlannerError::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_overrides() {
        let mut resources = ResourceSet::default();
        ConfigParser::apply_overrides(&mut resources, |key| match key {
            ENV_DEFAULT_NAMESPACE => Some(String::from("team-x")),
            ENV_GENERATOR => Some(String::from(" ")),
            _ => None,
        });

        assert_eq!(resources.default_namespace(), "team-x");
        assert!(resources.defaults.generator.is_none());
    }

    #[test]
    fn test_find_config_file_searches_parents() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp_dir.path().join("declplan.yml"), "resources: []\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, temp_dir.path().join("declplan.yml"));

        let loaded = ConfigParser::new().load_with_env(&found).unwrap();
        assert!(loaded.resources.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConfigParser::new()
            .load_file(temp_dir.path().join("absent.yaml"))
            .unwrap_err();
        assert!(matches!(err, PlannerError::Config(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_dotenv_without_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ConfigParser::new().with_base_path(temp_dir.path()).load_dotenv().is_ok());
    }
}
