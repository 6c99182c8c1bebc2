//! Expansion of shared policy group references inside flows.

use crate::registry::SharedPolicyGroupRegistry;
use gatesync_protocol::{FlowPhase, Step};
use std::sync::Arc;
use tracing::warn;

/// Replaces steps referencing a shared policy group with the group's steps.
///
/// A missing group, a phase mismatch or a nested group never fails the
/// flow: the reference contributes no steps and a warning is logged.
pub struct SharedPolicyGroupPolicyResolver {
    registry: Arc<SharedPolicyGroupRegistry>,
}

impl SharedPolicyGroupPolicyResolver {
    /// Creates a resolver reading `registry`.
    pub fn new(registry: Arc<SharedPolicyGroupRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the executable steps of a flow phase.
    pub fn expand(&self, steps: &[Step], environment_id: &str, phase: FlowPhase) -> Vec<Step> {
        let mut expanded = Vec::with_capacity(steps.len());
        for step in steps.iter().filter(|s| s.enabled) {
            if !step.is_shared_policy_group() {
                expanded.push(step.clone());
                continue;
            }
            expanded.extend(self.resolve(step, environment_id, phase));
        }
        expanded
    }

    fn resolve(&self, step: &Step, environment_id: &str, phase: FlowPhase) -> Vec<Step> {
        let Some(cross_id) = step.shared_policy_group_id() else {
            warn!(step = %step.name, "shared policy group step has no group id, ignoring");
            return Vec::new();
        };
        let Some(group) = self.registry.get(cross_id, environment_id) else {
            warn!(
                cross_id,
                environment_id,
                "No Shared Policy Group found for id {} on {} phase",
                cross_id,
                phase.as_str()
            );
            return Vec::new();
        };
        if group.definition.phase != phase {
            warn!(
                cross_id,
                expected = phase.as_str(),
                actual = group.definition.phase.as_str(),
                "shared policy group does not run in this phase, ignoring"
            );
            return Vec::new();
        }

        group
            .definition
            .steps
            .iter()
            .filter(|inner| inner.enabled)
            .filter(|inner| {
                if inner.is_shared_policy_group() {
                    warn!(
                        "Nested Shared Policy Group is not supported. The Shared Policy Group {} will be ignored",
                        inner.name
                    );
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect()
    }
}
