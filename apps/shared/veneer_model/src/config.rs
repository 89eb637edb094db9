//! Schema-validated configuration
//!
//! Configuration files are JSON. Before deserializing, the document is checked
//! against the JSON Schema generated from the Rust type, so a typo in a field
//! value is reported with the schema path instead of a generic serde error.

use std::fs;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kind::FamilyKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    IoError(String, #[source] std::io::Error),

    #[error("JSON parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Schema validation failed: {0}")]
    ValidationError(String),
}

/// Types loaded from JSON and validated against their generated schema
pub trait SchemaValidated: JsonSchema + for<'de> Deserialize<'de> {
    /// Load and validate from a JSON file
    fn from_json_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(path.to_string(), e))?;

        Self::from_json_str(&content)
    }

    /// Load and validate from a JSON string
    fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        let schema = serde_json::to_value(Self::generate_schema())?;
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        validator
            .validate(&value)
            .map_err(|e| ConfigError::ValidationError(format!("{}", e)))?;

        Ok(serde_json::from_value(value)?)
    }

    fn generate_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Self)
    }

    /// Generated JSON Schema, pretty-printed
    fn schema_json() -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&Self::generate_schema())?)
    }
}

/// Object model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Families whose add/remove notifications the bridge subscribes to
    ///
    /// Untracked families still resolve wrappers lazily on `get`.
    #[serde(default = "default_tracked_families")]
    pub tracked_families: Vec<FamilyKind>,

    /// Retire wrappers whose native object vanished without a removal notification
    #[serde(default = "default_true")]
    pub heal_stale_entries: bool,
}

fn default_tracked_families() -> Vec<FamilyKind> {
    FamilyKind::ALL.to_vec()
}

fn default_true() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            tracked_families: default_tracked_families(),
            heal_stale_entries: true,
        }
    }
}

impl ModelConfig {
    /// Tracked families without duplicates, in bridge subscription order
    pub fn tracked(&self) -> Vec<FamilyKind> {
        FamilyKind::ALL
            .into_iter()
            .filter(|family| self.tracked_families.contains(family))
            .collect()
    }

    pub fn tracks(&self, family: FamilyKind) -> bool {
        self.tracked_families.contains(&family)
    }
}

impl SchemaValidated for ModelConfig {}
