use super::event_environment;
use crate::error::SyncResult;
use crate::reference::ReferenceResolver;
use crate::registry::{ActionOnApi, ApiRegistry, ReactableApi};
use crate::synchronizer::{AppliedChanges, SyncAction, SyncKind, UnregisterTarget};
use gatesync_protocol::{
    decode_payload, ApiDefinition, Event, EventProperty, EventType, Plan, ProtocolResult,
    SyncWindow,
};
use gatesync_repository::PlanRepository;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Downstream caches notified of the APIs deployed by each page.
///
/// Called once per page with every API deployed or updated in it, so
/// per-API lookups such as subscriptions or API keys can be loaded in bulk.
pub trait ApiDeploymentListener: Send + Sync {
    /// Handles the APIs deployed by one page.
    fn on_apis_deployed(&self, apis: &[ReactableApi]);
}

/// APIs: PUBLISH_API and START_API deploy, UNPUBLISH_API and STOP_API undeploy.
pub struct ApiKind {
    registry: Arc<ApiRegistry>,
    resolver: Arc<ReferenceResolver>,
    plans: Arc<dyn PlanRepository>,
    listeners: Vec<Arc<dyn ApiDeploymentListener>>,
}

impl ApiKind {
    /// Creates the API kind.
    pub fn new(
        registry: Arc<ApiRegistry>,
        resolver: Arc<ReferenceResolver>,
        plans: Arc<dyn PlanRepository>,
    ) -> Self {
        Self {
            registry,
            resolver,
            plans,
            listeners: Vec::new(),
        }
    }

    /// Adds a deployment listener.
    pub fn with_listener(mut self, listener: Arc<dyn ApiDeploymentListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Returns the registry this kind feeds.
    pub fn registry(&self) -> &Arc<ApiRegistry> {
        &self.registry
    }

    // One plan store call per page for every legacy definition in it.
    fn attach_legacy_plans(&self, apis: &mut [ReactableApi]) -> SyncResult<()> {
        let legacy: Vec<String> = apis
            .iter()
            .filter(|api| api.definition.is_legacy())
            .map(|api| api.definition.id.clone())
            .collect();
        if legacy.is_empty() {
            return Ok(());
        }

        let mut by_api: HashMap<String, Vec<Plan>> = HashMap::new();
        for plan in self.plans.find_by_apis(&legacy)? {
            by_api.entry(plan.api.clone()).or_default().push(plan);
        }
        debug!(apis = legacy.len(), "loaded plans of legacy apis");
        for api in apis.iter_mut().filter(|api| api.definition.is_legacy()) {
            api.definition.plans = by_api.remove(&api.definition.id).unwrap_or_default();
        }
        Ok(())
    }
}

impl SyncKind for ApiKind {
    type Entity = ReactableApi;

    fn name(&self) -> &'static str {
        "api"
    }

    fn id_property(&self) -> EventProperty {
        EventProperty::ApiId
    }

    fn event_types(&self, window: &SyncWindow) -> Vec<EventType> {
        if window.is_initial() {
            vec![EventType::PublishApi, EventType::StartApi]
        } else {
            vec![
                EventType::PublishApi,
                EventType::StartApi,
                EventType::UnpublishApi,
                EventType::StopApi,
            ]
        }
    }

    fn classify(&self, event_type: EventType) -> Option<SyncAction> {
        match event_type {
            EventType::PublishApi | EventType::StartApi => Some(SyncAction::Register),
            EventType::UnpublishApi | EventType::StopApi => Some(SyncAction::Unregister),
            _ => None,
        }
    }

    fn decode(&self, event: &Event) -> ProtocolResult<ReactableApi> {
        let definition: ApiDefinition = decode_payload(event)?;
        let environment = definition
            .environment_id
            .clone()
            .or_else(|| event_environment(event));
        Ok(ReactableApi::new(definition).with_environment(environment))
    }

    fn prepare(&self, mut apis: Vec<ReactableApi>) -> SyncResult<Vec<ReactableApi>> {
        for api in apis.iter_mut() {
            if let Some(environment_id) = api.environment_id.clone() {
                let entry = self.resolver.resolve(&environment_id)?;
                api.apply_references(&entry);
            }
        }
        self.attach_legacy_plans(&mut apis)?;
        Ok(apis)
    }

    fn register(&self, apis: Vec<ReactableApi>) -> SyncResult<AppliedChanges> {
        let mut applied = AppliedChanges::default();
        let mut deployed = Vec::new();
        let mut undeploy = Vec::new();

        for api in apis {
            match self.registry.required_action_for(&api) {
                ActionOnApi::Deploy => deployed.push(api),
                ActionOnApi::Undeploy => undeploy.push(api.definition.id),
                ActionOnApi::None => {
                    debug!(api_id = %api.definition.id, "api already up to date or not deployable")
                }
            }
        }

        for api in &deployed {
            if self.registry.register(api.clone()) == ActionOnApi::Deploy {
                applied.registered += 1;
            }
        }
        if !deployed.is_empty() {
            for listener in &self.listeners {
                listener.on_apis_deployed(&deployed);
            }
        }
        for api_id in undeploy {
            self.registry.unregister(&api_id);
            applied.unregistered += 1;
        }
        Ok(applied)
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
