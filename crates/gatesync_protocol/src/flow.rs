//! Flows and policy steps.

use serde::{Deserialize, Serialize};

/// Policy name of a step that delegates to a shared policy group.
pub const SHARED_POLICY_GROUP_POLICY: &str = "shared-policy-group-policy";

/// Execution phase of a flow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowPhase {
    /// Incoming request.
    Request,
    /// Outgoing response.
    Response,
    /// Message published by a client.
    Publish,
    /// Message delivered to a subscriber.
    Subscribe,
}

impl FlowPhase {
    /// Returns the phase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowPhase::Request => "REQUEST",
            FlowPhase::Response => "RESPONSE",
            FlowPhase::Publish => "PUBLISH",
            FlowPhase::Subscribe => "SUBSCRIBE",
        }
    }
}

/// One policy invocation inside a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Policy identifier.
    pub policy: String,
    /// Disabled steps are never executed.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Policy configuration.
    #[serde(default)]
    pub configuration: serde_json::Value,
}

fn enabled_by_default() -> bool {
    true
}

impl Step {
    /// Creates an enabled step for a policy.
    pub fn new(name: impl Into<String>, policy: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: policy.into(),
            enabled: true,
            configuration: serde_json::Value::Null,
        }
    }

    /// Creates a step delegating to a shared policy group.
    pub fn shared_policy_group(name: impl Into<String>, cross_id: impl Into<String>) -> Self {
        Self {
            configuration: serde_json::json!({ "sharedPolicyGroupId": cross_id.into() }),
            ..Self::new(name, SHARED_POLICY_GROUP_POLICY)
        }
    }

    /// Sets the configuration.
    pub fn with_configuration(mut self, configuration: serde_json::Value) -> Self {
        self.configuration = configuration;
        self
    }

    /// Returns true if this step delegates to a shared policy group.
    pub fn is_shared_policy_group(&self) -> bool {
        self.policy == SHARED_POLICY_GROUP_POLICY
    }

    /// Returns the cross ID of the referenced shared policy group.
    pub fn shared_policy_group_id(&self) -> Option<&str> {
        if !self.is_shared_policy_group() {
            return None;
        }
        self.configuration
            .get("sharedPolicyGroupId")
            .and_then(serde_json::Value::as_str)
    }
}

/// A named sequence of request and response steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Disabled flows are never executed.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Request phase steps.
    #[serde(default)]
    pub request: Vec<Step>,
    /// Response phase steps.
    #[serde(default)]
    pub response: Vec<Step>,
}
