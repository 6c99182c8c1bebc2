use crate::error::SyncResult;
use crate::registry::{OrganizationRegistry, ReactableOrganization};
use crate::synchronizer::{AppliedChanges, SyncAction, SyncKind, UnregisterTarget};
use gatesync_protocol::{
    decode_payload, Event, EventProperty, EventType, OrganizationDefinition, ProtocolResult,
    SyncWindow,
};
use std::sync::Arc;

/// Organizations: only PUBLISH_ORGANIZATION exists, so every event registers.
///
/// Organization events are platform-wide and not filtered by environment.
pub struct OrganizationKind {
    registry: Arc<OrganizationRegistry>,
}

impl OrganizationKind {
    /// Creates the organization kind.
    pub fn new(registry: Arc<OrganizationRegistry>) -> Self {
        Self { registry }
    }
}

impl SyncKind for OrganizationKind {
    type Entity = ReactableOrganization;

    fn name(&self) -> &'static str {
        "organization"
    }

    fn id_property(&self) -> EventProperty {
        EventProperty::OrganizationId
    }

    fn event_types(&self, _window: &SyncWindow) -> Vec<EventType> {
        vec![EventType::PublishOrganization]
    }

    fn classify(&self, event_type: EventType) -> Option<SyncAction> {
        (event_type == EventType::PublishOrganization).then_some(SyncAction::Register)
    }

    fn environment_scoped(&self) -> bool {
        false
    }

    fn decode(&self, event: &Event) -> ProtocolResult<ReactableOrganization> {
        let definition: OrganizationDefinition = decode_payload(event)?;
        let mut organization = ReactableOrganization::new(definition);
        organization.organization_id = Some(organization.definition.id.clone());
        organization.organization_hrid = organization.definition.hrid().map(str::to_string);
        Ok(organization)
    }

    fn register(&self, organizations: Vec<ReactableOrganization>) -> SyncResult<AppliedChanges> {
        let registered = organizations
            .into_iter()
            .map(|organization| self.registry.register(organization))
            .filter(|changed| *changed)
            .count();
        Ok(AppliedChanges {
            registered,
            unregistered: 0,
        })
    }

    fn unregister(&self, targets: Vec<UnregisterTarget>) -> SyncResult<AppliedChanges> {
        for target in &targets {
            self.registry.unregister(&target.id);
        }
        Ok(AppliedChanges {
            registered: 0,
            unregistered: targets.len(),
        })
    }
}
