//! Datastore configuration
//!
//! Loaded from a JSON file; every field is optional.
//!
//! ```json
//! {
//!   "tree_id_field": "id",
//!   "tree_parent_field": "__parent",
//!   "indexes": [{"field_name": "_model"}, {"field_name": "email", "unique": true}],
//!   "log_level": "info"
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};
use crate::cursor::{DEFAULT_TREE_ID, DEFAULT_TREE_PARENT};
use crate::observability::Severity;

/// One index declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Dotted field path to index
    pub field_name: String,

    /// Reject documents sharing a value on this field
    #[serde(default)]
    pub unique: bool,
}

impl IndexOptions {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            unique: false,
        }
    }

    pub fn unique(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            unique: true,
        }
    }
}

/// Datastore configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Default field holding a tree node's addressable id
    #[serde(default = "default_tree_id_field")]
    pub tree_id_field: String,

    /// Default field holding a tree node's parent id
    #[serde(default = "default_tree_parent_field")]
    pub tree_parent_field: String,

    /// Indexes ensured when the datastore opens
    #[serde(default)]
    pub indexes: Vec<IndexOptions>,

    /// Minimum log severity
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_tree_id_field() -> String {
    DEFAULT_TREE_ID.to_string()
}
fn default_tree_parent_field() -> String {
    DEFAULT_TREE_PARENT.to_string()
}
fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tree_id_field: default_tree_id_field(),
            tree_parent_field: default_tree_parent_field(),
            indexes: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::config(format!("Failed to read config: {}", e)))?;

        let config: StoreConfig = serde_json::from_str(&content)
            .map_err(|e| StoreError::config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> StoreResult<()> {
        if self.tree_id_field.is_empty() || self.tree_parent_field.is_empty() {
            return Err(StoreError::config("tree field names must not be empty"));
        }

        if self.tree_id_field == self.tree_parent_field {
            return Err(StoreError::config(format!(
                "tree_id_field and tree_parent_field must differ, both are '{}'",
                self.tree_id_field
            )));
        }

        let mut seen = HashSet::new();
        for index in &self.indexes {
            if index.field_name.is_empty() {
                return Err(StoreError::config("index field_name must not be empty"));
            }
            if !seen.insert(index.field_name.as_str()) {
                return Err(StoreError::config(format!(
                    "index on '{}' declared more than once",
                    index.field_name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.tree_id_field, "id");
        assert_eq!(config.tree_parent_field, "__parent");
        assert!(config.indexes.is_empty());
        assert_eq!(config.log_level, Severity::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let file = write_config(
            r#"{"indexes": [{"field_name": "_model"}, {"field_name": "email", "unique": true}],
                "log_level": "warn"}"#,
        );
        let config = StoreConfig::load(file.path()).unwrap();
        assert_eq!(config.tree_id_field, "id");
        assert_eq!(
            config.indexes,
            vec![IndexOptions::new("_model"), IndexOptions::unique("email")]
        );
        assert_eq!(config.log_level, Severity::Warn);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let file = write_config("{not json");
        assert!(matches!(
            StoreConfig::load(file.path()),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = StoreConfig::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let same = StoreConfig {
            tree_parent_field: "id".into(),
            ..StoreConfig::default()
        };
        assert!(same.validate().is_err());

        let empty = StoreConfig {
            tree_id_field: String::new(),
            ..StoreConfig::default()
        };
        assert!(empty.validate().is_err());

        let duplicate = StoreConfig {
            indexes: vec![IndexOptions::new("a"), IndexOptions::unique("a")],
            ..StoreConfig::default()
        };
        assert!(duplicate.validate().is_err());
    }
}
