//! Shared policy groups.

use crate::flow::{FlowPhase, Step};
use serde::{Deserialize, Serialize};

/// Deployment state of a shared policy group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Not running on gateways. Initial state.
    Undeployed,
    /// Running on gateways.
    Deployed,
}

/// A reusable sequence of steps that API flows reference by cross ID.
///
/// The same struct is the live management record, the history snapshot and
/// the payload of DEPLOY/UNDEPLOY events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPolicyGroup {
    /// Per-environment ID.
    pub id: String,
    /// Identifier stable across environments and promotions.
    pub cross_id: String,
    /// Owning environment.
    pub environment_id: String,
    /// Owning organization.
    pub organization_id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Incremented on every lifecycle transition.
    pub version: u32,
    /// Deployment state.
    pub lifecycle_state: LifecycleState,
    /// Phase the steps run in.
    pub phase: FlowPhase,
    /// Steps run in order.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Last deployment time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<i64>,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
    /// Last update time in epoch milliseconds.
    pub updated_at: i64,
}

impl SharedPolicyGroup {
    /// Returns true if the group is running on gateways.
    pub fn is_deployed(&self) -> bool {
        self.lifecycle_state == LifecycleState::Deployed
    }

    /// Returns the deployed snapshot of this group.
    pub fn deploy(&self, now: i64) -> SharedPolicyGroup {
        let at = self.next_timestamp(now);
        SharedPolicyGroup {
            version: self.version + 1,
            lifecycle_state: LifecycleState::Deployed,
            deployed_at: Some(at),
            updated_at: at,
            ..self.clone()
        }
    }

    /// Returns the undeployed snapshot of this group.
    pub fn undeploy(&self, now: i64) -> SharedPolicyGroup {
        let at = self.next_timestamp(now);
        SharedPolicyGroup {
            version: self.version + 1,
            lifecycle_state: LifecycleState::Undeployed,
            updated_at: at,
            ..self.clone()
        }
    }

    // Keeps timestamps strictly increasing even when the clock does not move.
    fn next_timestamp(&self, now: i64) -> i64 {
        now.max(self.updated_at + 1)
    }
}
