//! Dispatch of API debug requests.

use crate::error::SyncResult;
use crate::reference::ReferenceResolver;
use crate::registry::ReactableApi;
use crate::scheduler::SyncJob;
use crate::synchronizer::SyncReport;
use gatesync_protocol::{
    decode_payload, ApiDefinition, Event, EventCriteria, EventProperty, EventType, SyncWindow,
    DEBUG_STATUS_DEBUGGING, DEBUG_STATUS_TO_DEBUG,
};
use gatesync_repository::EventRepository;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Runs a debug session for an API definition.
pub trait DebugHandler: Send + Sync {
    /// Starts debugging. Returns false if the request was refused.
    fn handle(&self, event: &Event, api: &ReactableApi) -> bool;
}

/// Routes DEBUG_API events straight to a [`DebugHandler`].
///
/// Debug requests are few, so they are read with one unpaginated search
/// instead of being reconciled. An accepted request is marked as debugging
/// so the next poll ignores it.
pub struct DebugEventDispatcher {
    events: Arc<dyn EventRepository>,
    resolver: Arc<ReferenceResolver>,
    handler: Arc<dyn DebugHandler>,
}

impl DebugEventDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        events: Arc<dyn EventRepository>,
        resolver: Arc<ReferenceResolver>,
        handler: Arc<dyn DebugHandler>,
    ) -> Self {
        Self {
            events,
            resolver,
            handler,
        }
    }

    /// Hands every pending debug request of `[from, to)` to the handler.
    pub fn dispatch(
        &self,
        from: i64,
        to: i64,
        environments: &BTreeSet<String>,
    ) -> SyncResult<SyncReport> {
        let start = Instant::now();
        let window = SyncWindow::new(from.max(0), to);
        let criteria = EventCriteria::new()
            .with_types([EventType::DebugApi])
            .with_property(EventProperty::ApiDebugStatus, [DEBUG_STATUS_TO_DEBUG])
            .with_environments(environments.iter().cloned())
            .with_window(window);

        let events = self.events.search(&criteria)?;
        let mut report = SyncReport {
            fetched: events.len(),
            ..SyncReport::default()
        };
        for event in events {
            let definition: ApiDefinition = match decode_payload(&event) {
                Ok(definition) => definition,
                Err(e) => {
                    warn!(event_id = %event.id, error = %e, "unable to read debug event, skipping");
                    report.failed += 1;
                    continue;
                }
            };
            let mut api = ReactableApi::new(definition);
            if let Some(environment_id) = event.environments.iter().next() {
                let entry = self.resolver.resolve(environment_id)?;
                api.apply_references(&entry);
            }

            if !self.handler.handle(&event, &api) {
                debug!(event_id = %event.id, "debug request refused");
                report.skipped += 1;
                continue;
            }
            let patched = event
                .clone()
                .with_property(EventProperty::ApiDebugStatus, DEBUG_STATUS_DEBUGGING);
            self.events.create_or_patch(patched)?;
            report.registered += 1;
        }
        report.duration = start.elapsed();
        Ok(report)
    }
}

impl SyncJob for DebugEventDispatcher {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn synchronize(&self, from: i64, to: i64, environments: &BTreeSet<String>) -> SyncResult<SyncReport> {
        self.dispatch(from, to, environments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatesync_protocol::{encode_payload, DefinitionVersion};
    use gatesync_repository::{
        Environment, InMemoryEnvironmentRepository, InMemoryEventRepository,
        InMemoryOrganizationRepository,
    };
    use parking_lot::Mutex;

    struct RecordingHandler {
        accept: bool,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    impl DebugHandler for RecordingHandler {
        fn handle(&self, _event: &Event, api: &ReactableApi) -> bool {
            self.seen
                .lock()
                .push((api.definition.id.clone(), api.environment_hrid.clone()));
            self.accept
        }
    }

    fn debug_event(id: &str, status: &str) -> Event {
        let api = ApiDefinition::new("api-1", DefinitionVersion::V4);
        Event::new(EventType::DebugApi, 10)
            .with_id(id)
            .with_property(EventProperty::ApiId, "api-1")
            .with_property(EventProperty::ApiDebugStatus, status)
            .with_environment("env-A")
            .with_payload(encode_payload(&api).unwrap())
    }

    fn dispatcher(
        events: Arc<InMemoryEventRepository>,
        accept: bool,
    ) -> (DebugEventDispatcher, Arc<RecordingHandler>) {
        let environments = Arc::new(InMemoryEnvironmentRepository::new());
        environments.insert(Environment::new("env-A", "org-1", "dev"));
        let resolver = Arc::new(ReferenceResolver::new(
            environments,
            Arc::new(InMemoryOrganizationRepository::new()),
            16,
        ));
        let handler = Arc::new(RecordingHandler {
            accept,
            seen: Mutex::new(Vec::new()),
        });
        (
            DebugEventDispatcher::new(events, resolver, handler.clone()),
            handler,
        )
    }

    fn envs() -> BTreeSet<String> {
        BTreeSet::from(["env-A".to_string()])
    }

    #[test]
    fn accepted_requests_are_marked_debugging() {
        let events = Arc::new(InMemoryEventRepository::with_events([
            debug_event("evt-1", DEBUG_STATUS_TO_DEBUG),
            debug_event("evt-2", DEBUG_STATUS_DEBUGGING),
        ]));
        let (dispatcher, handler) = dispatcher(events.clone(), true);

        let report = dispatcher.dispatch(-1, 100, &envs()).unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.registered, 1);
        assert_eq!(
            *handler.seen.lock(),
            [("api-1".to_string(), Some("dev".to_string()))]
        );
        assert!(events
            .events()
            .iter()
            .all(|e| e.property(EventProperty::ApiDebugStatus) == Some(DEBUG_STATUS_DEBUGGING)));

        let again = dispatcher.dispatch(-1, 100, &envs()).unwrap();
        assert_eq!(again.fetched, 0);
    }

    #[test]
    fn refused_requests_stay_pending() {
        let events = Arc::new(InMemoryEventRepository::with_events([debug_event(
            "evt-1",
            DEBUG_STATUS_TO_DEBUG,
        )]));
        let (dispatcher, _) = dispatcher(events.clone(), false);

        let report = dispatcher.dispatch(-1, 100, &envs()).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(events.writes(), 0);
    }
}
