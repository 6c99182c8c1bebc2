//! Dictionary definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value properties published to gateways for use in expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryDefinition {
    /// Dictionary ID.
    pub id: String,
    /// Key used to reference the dictionary.
    #[serde(default)]
    pub key: String,
    /// Owning environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    /// Deployment time in epoch milliseconds.
    #[serde(default)]
    pub deployed_at: i64,
    /// Dictionary entries.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl DictionaryDefinition {
    /// Creates an empty dictionary.
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            environment_id: None,
            deployed_at: 0,
            properties: BTreeMap::new(),
        }
    }

    /// Sets the deployment time.
    pub fn with_deployed_at(mut self, deployed_at: i64) -> Self {
        self.deployed_at = deployed_at;
        self
    }

    /// Adds an entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
