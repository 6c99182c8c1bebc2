//! Organization definitions.

use crate::flow::Flow;
use serde::{Deserialize, Serialize};

/// Platform-level settings of an organization, including its flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDefinition {
    /// Organization ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Human-readable identifiers; the first one is canonical.
    #[serde(default)]
    pub hrids: Vec<String>,
    /// Platform flows applied to every API.
    #[serde(default)]
    pub flows: Vec<Flow>,
    /// Last update in epoch milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl OrganizationDefinition {
    /// Creates an organization definition.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hrids: Vec::new(),
            flows: Vec::new(),
            updated_at: 0,
        }
    }

    /// Returns the canonical human-readable identifier.
    pub fn hrid(&self) -> Option<&str> {
        self.hrids.first().map(String::as_str)
    }
}
