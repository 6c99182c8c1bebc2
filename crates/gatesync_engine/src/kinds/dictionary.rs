use super::event_environment;
use crate::error::SyncResult;
use crate::registry::{DictionaryRegistry, ReactableDictionary};
use crate::synchronizer::{AppliedChanges, SyncAction, SyncKind, UnregisterTarget};
use gatesync_protocol::{
    decode_payload, DictionaryDefinition, Event, EventProperty, EventType, ProtocolResult,
    SyncWindow,
};
use std::sync::Arc;

/// Dictionaries: PUBLISH_DICTIONARY deploys, UNPUBLISH_DICTIONARY undeploys.
pub struct DictionaryKind {
    registry: Arc<DictionaryRegistry>,
}

impl DictionaryKind {
    /// Creates the dictionary kind.
    pub fn new(registry: Arc<DictionaryRegistry>) -> Self {
        Self { registry }
    }
}

impl SyncKind for DictionaryKind {
    type Entity = ReactableDictionary;

    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn id_property(&self) -> EventProperty {
        EventProperty::DictionaryId
    }

    fn event_types(&self, window: &SyncWindow) -> Vec<EventType> {
        if window.is_initial() {
            vec![EventType::PublishDictionary]
        } else {
            vec![EventType::PublishDictionary, EventType::UnpublishDictionary]
        }
    }

    fn classify(&self, event_type: EventType) -> Option<SyncAction> {
        match event_type {
            EventType::PublishDictionary => Some(SyncAction::Register),
            EventType::UnpublishDictionary => Some(SyncAction::Unregister),
            _ => None,
        }
    }

    fn decode(&self, event: &Event) -> ProtocolResult<ReactableDictionary> {
        let definition: DictionaryDefinition = decode_payload(event)?;
        let environment = definition
            .environment_id
            .clone()
            .or_else(|| event_environment(event));
        Ok(ReactableDictionary::new(definition).with_environment(environment))
    }

    fn register(&self, dictionaries: Vec<ReactableDictionary>) -> SyncResult<AppliedChanges> {
        let registered = dictionaries
            .into_iter()
            .map(|dictionary| self.registry.register(dictionary))
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
