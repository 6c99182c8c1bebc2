//! API and plan definitions.

use crate::flow::Flow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Definition format of an API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefinitionVersion {
    /// Legacy path-based definition. Plans are stored apart from the API.
    #[serde(rename = "1.0.0")]
    V1,
    /// Flow-based definition with embedded plans.
    #[serde(rename = "2.0.0")]
    V2,
    /// Protocol-agnostic definition with embedded plans.
    #[serde(rename = "4.0.0")]
    V4,
}

/// Publication status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    /// Being prepared, not usable.
    Staging,
    /// Open for subscriptions.
    Published,
    /// Usable by existing subscribers only.
    Deprecated,
    /// No longer usable.
    Closed,
}

/// A plan exposing an API to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Plan ID.
    pub id: String,
    /// Owning API ID.
    pub api: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Publication status.
    pub status: PlanStatus,
    /// Sharding tags restricting which gateways serve the plan.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Security type, such as `API_KEY` or `KEY_LESS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    /// Plan-level flows.
    #[serde(default)]
    pub flows: Vec<Flow>,
}

impl Plan {
    /// Creates a plan.
    pub fn new(id: impl Into<String>, api: impl Into<String>, status: PlanStatus) -> Self {
        Self {
            id: id.into(),
            api: api.into(),
            name: String::new(),
            status,
            tags: BTreeSet::new(),
            security: None,
            flows: Vec::new(),
        }
    }

    /// Adds a sharding tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Returns true if the plan can serve traffic.
    pub fn is_active(&self) -> bool {
        matches!(self.status, PlanStatus::Published | PlanStatus::Deprecated)
    }
}

/// An API definition as carried by PUBLISH_API and START_API events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefinition {
    /// API ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Definition format.
    pub definition_version: DefinitionVersion,
    /// Owning environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    /// Deployment time in epoch milliseconds.
    #[serde(default)]
    pub deployed_at: i64,
    /// Revision label of the deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Stopped APIs are not deployable.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Sharding tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Embedded plans. Empty for V1 definitions.
    #[serde(default)]
    pub plans: Vec<Plan>,
    /// API-level flows.
    #[serde(default)]
    pub flows: Vec<Flow>,
}

fn enabled_by_default() -> bool {
    true
}

impl ApiDefinition {
    /// Creates an enabled API definition.
    pub fn new(id: impl Into<String>, definition_version: DefinitionVersion) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            definition_version,
            environment_id: None,
            deployed_at: 0,
            revision: None,
            enabled: true,
            tags: BTreeSet::new(),
            plans: Vec::new(),
            flows: Vec::new(),
        }
    }

    /// Sets the owning environment.
    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.environment_id = Some(environment_id.into());
        self
    }

    /// Sets the deployment time.
    pub fn with_deployed_at(mut self, deployed_at: i64) -> Self {
        self.deployed_at = deployed_at;
        self
    }

    /// Sets the revision label.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Adds a sharding tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adds a plan.
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plans.push(plan);
        self
    }

    /// Returns true if plans must be loaded from the plan store.
    pub fn is_legacy(&self) -> bool {
        self.definition_version == DefinitionVersion::V1
    }
}
