//! Shared policy group use cases.
//!
//! Deploy and undeploy persist a new snapshot, append it to the history and
//! publish the matching event, keyed by cross ID so every gateway converges
//! on the same group whatever its local ID.

use crate::context::ManagementContext;
use crate::error::{ManagementError, ManagementResult};
use gatesync_protocol::{
    encode_payload, Event, EventProperty, EventType, FlowPhase, LifecycleState, SharedPolicyGroup,
    Step,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const ENTITY: &str = "shared policy group";
const HISTORY: &str = "shared policy group deployment";

/// Input of [`SharedPolicyGroupService::create`].
#[derive(Debug, Clone)]
pub struct NewSharedPolicyGroup {
    /// Cross ID; generated when absent.
    pub cross_id: Option<String>,
    /// Owning environment.
    pub environment_id: String,
    /// Owning organization.
    pub organization_id: String,
    /// Display name; must not be blank.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Phase the steps run in.
    pub phase: FlowPhase,
    /// Steps run in order.
    pub steps: Vec<Step>,
}

impl NewSharedPolicyGroup {
    /// Creates an input with no steps.
    pub fn new(
        environment_id: impl Into<String>,
        organization_id: impl Into<String>,
        name: impl Into<String>,
        phase: FlowPhase,
    ) -> Self {
        Self {
            cross_id: None,
            environment_id: environment_id.into(),
            organization_id: organization_id.into(),
            name: name.into(),
            description: None,
            phase,
            steps: Vec::new(),
        }
    }

    /// Sets the cross ID.
    pub fn with_cross_id(mut self, cross_id: impl Into<String>) -> Self {
        self.cross_id = Some(cross_id.into());
        self
    }

    /// Appends a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// Input of [`SharedPolicyGroupService::update`]. `None` keeps a field.
#[derive(Debug, Clone, Default)]
pub struct SharedPolicyGroupUpdate {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New steps.
    pub steps: Option<Vec<Step>>,
}

/// Create, update, deploy, undeploy and delete of shared policy groups.
pub struct SharedPolicyGroupService {
    context: Arc<ManagementContext>,
}

impl SharedPolicyGroupService {
    /// Creates the service.
    pub fn new(context: Arc<ManagementContext>) -> Self {
        Self { context }
    }

    /// Creates an undeployed group at version 0.
    pub fn create(&self, input: NewSharedPolicyGroup) -> ManagementResult<SharedPolicyGroup> {
        validate(&input.name, &input.steps)?;
        let now = self.context.now();
        let group = SharedPolicyGroup {
            id: Uuid::new_v4().to_string(),
            cross_id: input
                .cross_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            environment_id: input.environment_id,
            organization_id: input.organization_id,
            name: input.name.trim().to_string(),
            description: input.description,
            version: 0,
            lifecycle_state: LifecycleState::Undeployed,
            phase: input.phase,
            steps: input.steps,
            deployed_at: None,
            created_at: now,
            updated_at: now,
        };
        let group = self.context.groups.create(group)?;
        info!(group_id = %group.id, cross_id = %group.cross_id, "shared policy group created");
        Ok(group)
    }

    /// Edits the live record. The lifecycle state is kept; gateways only see
    /// the change on the next deploy.
    pub fn update(
        &self,
        group_id: &str,
        environment_id: &str,
        update: SharedPolicyGroupUpdate,
    ) -> ManagementResult<SharedPolicyGroup> {
        let mut group = self.find(group_id, environment_id)?;
        if let Some(name) = update.name {
            group.name = name.trim().to_string();
        }
        if update.description.is_some() {
            group.description = update.description;
        }
        if let Some(steps) = update.steps {
            group.steps = steps;
        }
        validate(&group.name, &group.steps)?;
        group.updated_at = self.context.now().max(group.updated_at + 1);
        Ok(self.context.groups.update(group)?)
    }

    /// Deploys the live record and publishes DEPLOY_SHARED_POLICY_GROUP.
    pub fn deploy(&self, group_id: &str, environment_id: &str) -> ManagementResult<SharedPolicyGroup> {
        let live = self.find(group_id, environment_id)?;
        let deployed = live.deploy(self.context.now());

        self.context.groups.update(deployed.clone())?;
        self.context.history.create(deployed.clone())?;
        self.publish(&deployed, EventType::DeploySharedPolicyGroup)?;
        info!(
            group_id,
            cross_id = %deployed.cross_id,
            version = deployed.version,
            "shared policy group deployed"
        );
        Ok(deployed)
    }

    /// Undeploys the last deployed snapshot and publishes
    /// UNDEPLOY_SHARED_POLICY_GROUP.
    ///
    /// The published payload is what gateways were running, not the live
    /// record, which may have been edited since.
    pub fn undeploy(&self, group_id: &str, environment_id: &str) -> ManagementResult<SharedPolicyGroup> {
        let live = self.find(group_id, environment_id)?;
        let last_deployed = self
            .context
            .history
            .find_latest_deployed(group_id)?
            .ok_or_else(|| ManagementError::not_found(HISTORY, group_id))?;

        let base = SharedPolicyGroup {
            version: live.version.max(last_deployed.version),
            updated_at: live.updated_at.max(last_deployed.updated_at),
            ..last_deployed
        };
        let undeployed = base.undeploy(self.context.now());

        self.context.history.create(undeployed.clone())?;
        self.publish(&undeployed, EventType::UndeploySharedPolicyGroup)?;
        self.context.groups.update(SharedPolicyGroup {
            version: undeployed.version,
            lifecycle_state: LifecycleState::Undeployed,
            updated_at: undeployed.updated_at,
            ..live
        })?;
        info!(
            group_id,
            cross_id = %undeployed.cross_id,
            version = undeployed.version,
            "shared policy group undeployed"
        );
        Ok(undeployed)
    }

    /// Publishes an undeploy, then removes the record and its history.
    pub fn delete(&self, group_id: &str, environment_id: &str) -> ManagementResult<()> {
        let live = self.find(group_id, environment_id)?;
        if live.is_deployed() {
            self.undeploy(group_id, environment_id)?;
        } else {
            // Gateways that never saw the group ignore this event.
            let undeployed = live.undeploy(self.context.now());
            self.publish(&undeployed, EventType::UndeploySharedPolicyGroup)?;
        }

        let removed = self.context.history.delete_by_group(group_id)?;
        self.context.groups.delete(group_id)?;
        info!(group_id, history = removed, "shared policy group deleted");
        Ok(())
    }

    /// Returns the live record of a group in the caller's environment.
    pub fn get(&self, group_id: &str, environment_id: &str) -> ManagementResult<SharedPolicyGroup> {
        self.find(group_id, environment_id)
    }

    fn find(&self, group_id: &str, environment_id: &str) -> ManagementResult<SharedPolicyGroup> {
        match self.context.groups.find_by_id(group_id)? {
            Some(group) if group.environment_id == environment_id => Ok(group),
            Some(_) => {
                debug!(group_id, environment_id, "shared policy group belongs to another environment");
                Err(ManagementError::not_found(ENTITY, group_id))
            }
            None => Err(ManagementError::not_found(ENTITY, group_id)),
        }
    }

    fn publish(&self, snapshot: &SharedPolicyGroup, event_type: EventType) -> ManagementResult<Event> {
        let event = self.context.publisher.create_event(
            &snapshot.organization_id,
            &snapshot.environment_id,
            BTreeSet::from([snapshot.environment_id.clone()]),
            event_type,
            encode_payload(snapshot)?,
            [(EventProperty::SharedPolicyGroupId, snapshot.cross_id.clone())],
        )?;
        self.context.publisher.create_or_patch_latest_event(
            &snapshot.organization_id,
            &snapshot.id,
            event,
        )
    }
}

fn validate(name: &str, steps: &[Step]) -> ManagementResult<()> {
    if name.trim().is_empty() {
        return Err(ManagementError::validation("name must not be blank"));
    }
    if let Some(nested) = steps.iter().find(|step| step.is_shared_policy_group()) {
        return Err(ManagementError::validation(format!(
            "step {} references a shared policy group, nesting is not supported",
            nested.name
        )));
    }
    Ok(())
}
