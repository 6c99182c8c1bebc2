use crate::error::SyncResult;
use crate::reference::ReferenceResolver;
use crate::registry::{ReactableSharedPolicyGroup, SharedPolicyGroupRegistry};
use crate::synchronizer::{AppliedChanges, SyncAction, SyncKind, UnregisterTarget};
use gatesync_protocol::{
    decode_payload, Event, EventProperty, EventType, ProtocolResult, SharedPolicyGroup,
    SyncWindow,
};
use std::sync::Arc;

/// Shared policy groups, identified on events by their cross ID.
pub struct SharedPolicyGroupKind {
    registry: Arc<SharedPolicyGroupRegistry>,
    resolver: Arc<ReferenceResolver>,
}

impl SharedPolicyGroupKind {
    /// Creates the shared policy group kind.
    pub fn new(registry: Arc<SharedPolicyGroupRegistry>, resolver: Arc<ReferenceResolver>) -> Self {
        Self { registry, resolver }
    }
}

impl SyncKind for SharedPolicyGroupKind {
    type Entity = ReactableSharedPolicyGroup;

    fn name(&self) -> &'static str {
        "shared-policy-group"
    }

    fn id_property(&self) -> EventProperty {
        EventProperty::SharedPolicyGroupId
    }

    fn event_types(&self, window: &SyncWindow) -> Vec<EventType> {
        if window.is_initial() {
            vec![EventType::DeploySharedPolicyGroup]
        } else {
            vec![
                EventType::DeploySharedPolicyGroup,
                EventType::UndeploySharedPolicyGroup,
            ]
        }
    }

    fn classify(&self, event_type: EventType) -> Option<SyncAction> {
        match event_type {
            EventType::DeploySharedPolicyGroup => Some(SyncAction::Register),
            EventType::UndeploySharedPolicyGroup => Some(SyncAction::Unregister),
            _ => None,
        }
    }

    fn group_by_environment(&self) -> bool {
        true
    }

    fn decode(&self, event: &Event) -> ProtocolResult<ReactableSharedPolicyGroup> {
        let definition: SharedPolicyGroup = decode_payload(event)?;
        let environment = Some(definition.environment_id.clone());
        Ok(ReactableSharedPolicyGroup::new(definition).with_environment(environment))
    }

    fn prepare(
        &self,
        mut groups: Vec<ReactableSharedPolicyGroup>,
    ) -> SyncResult<Vec<ReactableSharedPolicyGroup>> {
        for group in groups.iter_mut() {
            let entry = self.resolver.resolve(&group.definition.environment_id)?;
            group.apply_references(&entry);
        }
        Ok(groups)
    }

    fn register(&self, groups: Vec<ReactableSharedPolicyGroup>) -> SyncResult<AppliedChanges> {
        let registered = groups
            .into_iter()
            .map(|group| self.registry.register(group))
            .filter(|changed| *changed)
            .count();
        Ok(AppliedChanges {
            registered,
            unregistered: 0,
        })
    }

    fn unregister(&self, targets: Vec<UnregisterTarget>) -> SyncResult<AppliedChanges> {
        let mut unregistered = 0;
        for target in targets {
            if target.environments.is_empty() {
                self.registry.unregister_everywhere(&target.id);
                unregistered += 1;
            }
            for environment_id in &target.environments {
                self.registry.unregister(&target.id, environment_id);
                unregistered += 1;
            }
        }
        Ok(AppliedChanges {
            registered: 0,
            unregistered,
        })
    }
}
