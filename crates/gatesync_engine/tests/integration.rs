//! Integration tests for gateway synchronization.

use gatesync_engine::{
    ApiDeploymentListener, ApiKind, ApiRegistry, DebugHandler, GatewaySync, ReactableApi,
    ReactableDictionary, ReactableSharedPolicyGroup, ReferenceResolver, ShardingTags, SyncConfig,
    SyncJob, Synchronizer,
};
use gatesync_protocol::{
    now_millis, Event, EventCriteria, EventProperty, EventType, FlowPhase, Step,
    DEBUG_STATUS_DEBUGGING, DEBUG_STATUS_TO_DEBUG,
};
use gatesync_repository::{EventRepository, RepositoryError, RepositoryResult};
use gatesync_testkit::prelude::*;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

const FROM: i64 = 1;
const TO: i64 = 1_000_000;

fn config() -> SyncConfig {
    SyncConfig::new([ENV_A, ENV_B])
}

fn gateway(stores: &TestStores, config: SyncConfig) -> GatewaySync {
    GatewaySync::new(config, stores.repositories().into()).unwrap()
}

fn environments() -> BTreeSet<String> {
    BTreeSet::from([ENV_A.to_string(), ENV_B.to_string()])
}

#[test]
fn publish_api_registers_once() {
    let stores = TestStores::with_events([api_event(&api("api-1"), EventType::PublishApi, 10)]);
    let gateway = gateway(&stores, config());

    let report = gateway
        .api_synchronizer()
        .synchronize(-1, now_millis(), &environments())
        .unwrap();

    let stats = gateway.apis().stats();
    assert_eq!(stats.register_calls, 1);
    assert_eq!(stats.unregister_calls, 0);
    assert_eq!(report.registered, 1);
    let deployed = gateway.apis().get("api-1").unwrap();
    assert_eq!(deployed.environment_hrid.as_deref(), Some(ENV_A_HRID));
    assert_eq!(deployed.organization_id.as_deref(), Some(ORGANIZATION));
    assert_eq!(deployed.organization_hrid.as_deref(), Some(ORGANIZATION_HRID));
}

#[test]
fn later_unpublish_only_unregisters() {
    let stores = TestStores::with_events([
        api_event(&api("api-1"), EventType::PublishApi, 10),
        api_event(&api("api-1"), EventType::UnpublishApi, 20),
    ]);
    let gateway = gateway(&stores, config());

    gateway
        .api_synchronizer()
        .synchronize(FROM, TO, &environments())
        .unwrap();

    let stats = gateway.apis().stats();
    assert_eq!(stats.register_calls, 0);
    assert_eq!(stats.unregister_calls, 1);
    assert!(gateway.apis().is_empty());
}

#[test]
fn initial_window_ignores_removal_events() {
    let stores = TestStores::with_events([
        api_event(&api("api-1"), EventType::StartApi, 10),
        api_event(&api("api-1"), EventType::StopApi, 20),
    ]);
    let gateway = gateway(&stores, config());

    let report = gateway
        .api_synchronizer()
        .synchronize(-1, TO, &environments())
        .unwrap();

    // The latest event is a stop, which a full resync does not query.
    assert_eq!(report.fetched, 0);
    assert!(gateway.apis().is_empty());
    assert_eq!(gateway.apis().stats().unregister_calls, 0);
}

#[test]
fn single_item_pages_over_many_entities() {
    let events: Vec<Event> = (0..500)
        .map(|i| {
            let event_type = if i % 2 == 0 {
                EventType::StartApi
            } else {
                EventType::StopApi
            };
            api_event(&api(&format!("api-{i}")), event_type, 10 + i)
        })
        .collect();
    let stores = TestStores::with_events(events);
    let gateway = gateway(&stores, config().with_bulk_items(1));

    let report = gateway
        .api_synchronizer()
        .synchronize(FROM, TO, &environments())
        .unwrap();

    let stats = gateway.apis().stats();
    assert_eq!(stats.register_calls, 250);
    assert_eq!(stats.unregister_calls, 250);
    assert_eq!(gateway.apis().len(), 250);
    assert_eq!(report.pages, 500);
    // One trailing empty page ends the run when the last page is full.
    assert_eq!(stores.events.search_latest_calls(), 501);
    assert_eq!(stores.environments.lookups(), 1);
    assert_eq!(stores.organizations.lookups(), 1);
}

#[test]
fn second_run_over_the_same_window_changes_nothing() {
    let stores = TestStores::with_events([
        api_event(&api("api-1"), EventType::StartApi, 10),
        api_event(&api("api-2"), EventType::StartApi, 11),
        dictionary_event(&dictionary("dict-1"), EventType::PublishDictionary, 12),
    ]);
    let gateway = gateway(&stores, config());

    gateway.synchronize_once(FROM, TO).unwrap();
    let apis = gateway.apis().apis();
    let dictionaries = gateway.dictionaries().dictionaries();

    let reports = gateway.synchronize_once(FROM, TO).unwrap();
    let (_, api_report) = reports.iter().find(|(name, _)| *name == "api").unwrap();
    assert_eq!(api_report.registered, 0);
    assert_eq!(gateway.apis().len(), apis.len());
    for api in apis {
        assert_eq!(gateway.apis().get(&api.definition.id), Some(api));
    }
    assert_eq!(gateway.dictionaries().dictionaries().len(), dictionaries.len());
}

#[test]
fn newer_deployment_replaces_the_registered_api() {
    let stores = TestStores::with_events([api_event(
        &api("api-1").with_revision("r1"),
        EventType::StartApi,
        10,
    )]);
    let gateway = gateway(&stores, config());
    gateway.synchronize_once(FROM, TO).unwrap();

    stores.publish(api_event(
        &api("api-1").with_revision("r2").with_deployed_at(50),
        EventType::PublishApi,
        60,
    ));
    gateway.synchronize_once(FROM, TO).unwrap();

    let deployed = gateway.apis().get("api-1").unwrap();
    assert_eq!(deployed.definition.revision.as_deref(), Some("r2"));
}

#[test]
fn legacy_plans_are_loaded_once_per_page() {
    let stores = TestStores::with_events(
        (0..5).map(|i| api_event(&legacy_api(&format!("api-{i}")), EventType::StartApi, 10 + i)),
    );
    for i in 0..5 {
        stores.plans.insert(legacy_plan(&format!("api-{i}")));
    }
    let gateway = gateway(&stores, config().with_bulk_items(3));

    gateway
        .api_synchronizer()
        .synchronize(FROM, TO, &environments())
        .unwrap();

    assert_eq!(stores.plans.find_by_apis_calls(), 2);
    let requests = stores.plans.requests();
    assert_eq!(requests[0].len(), 3);
    assert_eq!(requests[1].len(), 2);
    assert_eq!(gateway.apis().len(), 5);
    assert_eq!(gateway.apis().get("api-0").unwrap().definition.plans.len(), 1);
}

#[test]
fn legacy_api_without_plans_is_not_deployed() {
    let stores = TestStores::with_events([api_event(&legacy_api("api-1"), EventType::StartApi, 10)]);
    let gateway = gateway(&stores, config());

    gateway.synchronize_once(FROM, TO).unwrap();
    assert!(gateway.apis().is_empty());
}

#[derive(Default)]
struct RecordingListener {
    batches: Mutex<Vec<Vec<String>>>,
}

impl ApiDeploymentListener for RecordingListener {
    fn on_apis_deployed(&self, apis: &[ReactableApi]) {
        self.batches
            .lock()
            .push(apis.iter().map(|api| api.definition.id.clone()).collect());
    }
}

#[test]
fn listeners_are_notified_once_per_page() {
    let stores = TestStores::with_events(
        (0..4).map(|i| api_event(&api(&format!("api-{i}")), EventType::StartApi, 10 + i)),
    );
    let listener = Arc::new(RecordingListener::default());
    let handle: Arc<dyn ApiDeploymentListener> = listener.clone();
    let gateway = GatewaySync::with_listeners(
        config().with_bulk_items(2),
        stores.repositories().into(),
        vec![handle],
    )
    .unwrap();

    gateway.synchronize_once(FROM, TO).unwrap();

    let batches = listener.batches.lock();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|batch| batch.len() == 2));
}

#[test]
fn sharding_tags_select_apis() {
    let stores = TestStores::with_events([
        api_event(&api("internal").with_tag("Internal"), EventType::StartApi, 10),
        api_event(&api("external").with_tag("external"), EventType::StartApi, 11),
        api_event(&api("untagged"), EventType::StartApi, 12),
    ]);
    let gateway = gateway(&stores, config().with_sharding_tags(["internal"]));

    gateway.synchronize_once(FROM, TO).unwrap();

    assert!(gateway.apis().contains("internal"));
    assert!(!gateway.apis().contains("external"));
    assert!(!gateway.apis().contains("untagged"));
}

#[test]
fn apis_of_other_environments_are_ignored() {
    let stores = TestStores::with_events([
        api_event(&api("api-1"), EventType::StartApi, 10),
        api_event(&api("api-2").with_environment("env-C"), EventType::StartApi, 11),
    ]);
    let gateway = gateway(&stores, SyncConfig::new([ENV_A]));

    gateway.synchronize_once(FROM, TO).unwrap();
    assert!(gateway.apis().contains("api-1"));
    assert!(!gateway.apis().contains("api-2"));
}

#[test]
fn dictionaries_follow_their_latest_event() {
    let dict = dictionary("dict-1");
    let stores = TestStores::with_events([
        dictionary_event(&dict, EventType::PublishDictionary, 10),
        dictionary_event(&dictionary("dict-2"), EventType::PublishDictionary, 11),
    ]);
    let gateway = gateway(&stores, config());
    gateway.synchronize_once(FROM, TO).unwrap();
    assert_eq!(gateway.dictionaries().len(), 2);

    stores.publish(dictionary_event(&dict, EventType::UnpublishDictionary, 20));
    gateway.synchronize_once(FROM, TO).unwrap();
    assert!(gateway.dictionaries().get("dict-1").is_none());
    assert!(gateway.dictionaries().get("dict-2").is_some());
}

#[test]
fn organizations_are_not_scoped_to_environments() {
    let stores = TestStores::with_events([organization_event(&organization("org-2", "beta"), 10)]);
    let gateway = gateway(&stores, SyncConfig::new([ENV_A]));

    gateway.synchronize_once(FROM, TO).unwrap();

    let registered = gateway.organizations().get("org-2").unwrap();
    assert_eq!(registered.organization_hrid.as_deref(), Some("beta"));
}

#[test]
fn shared_policy_groups_expand_into_api_steps() {
    let group = shared_policy_group("spg-1", ENV_B).deploy(100);
    let stores = TestStores::with_events([shared_policy_group_event(
        &group,
        EventType::DeploySharedPolicyGroup,
        100,
    )]);
    let gateway = gateway(&stores, config());
    gateway.synchronize_once(FROM, TO).unwrap();

    let registered = gateway.shared_policy_groups().get("spg-1", ENV_B).unwrap();
    assert_eq!(registered.environment_hrid.as_deref(), Some(ENV_B_HRID));
    assert_eq!(registered.organization_hrid.as_deref(), Some(ORGANIZATION_HRID));

    let steps = [
        Step::new("auth", "api-key"),
        Step::shared_policy_group("limits", "spg-1"),
    ];
    let expanded = gateway
        .policy_resolver()
        .expand(&steps, ENV_B, FlowPhase::Request);
    let policies: Vec<_> = expanded.iter().map(|step| step.policy.as_str()).collect();
    assert_eq!(policies, ["api-key", "rate-limit"]);

    let elsewhere = gateway
        .policy_resolver()
        .expand(&steps, ENV_A, FlowPhase::Request);
    assert_eq!(elsewhere.len(), 1);
}

#[test]
fn unknown_environment_leaves_references_unresolved() {
    let stores = TestStores::with_events([api_event(
        &api("api-1").with_environment("env-C"),
        EventType::StartApi,
        10,
    )]);
    let gateway = gateway(&stores, SyncConfig::new(["env-C"]));

    gateway.synchronize_once(FROM, TO).unwrap();

    let deployed = gateway.apis().get("api-1").unwrap();
    assert_eq!(deployed.environment_id.as_deref(), Some("env-C"));
    assert_eq!(deployed.environment_hrid, None);
    assert_eq!(deployed.organization_id, None);
}

/// Event store returning canned pages, used to pin down paging behavior
/// a real store may exhibit.
struct ScriptedPages {
    pages: Mutex<VecDeque<RepositoryResult<Vec<Event>>>>,
}

impl ScriptedPages {
    fn new(pages: Vec<RepositoryResult<Vec<Event>>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
        }
    }
}

impl EventRepository for ScriptedPages {
    fn search_latest(
        &self,
        _criteria: &EventCriteria,
        _group: EventProperty,
        _page: usize,
        _size: usize,
    ) -> RepositoryResult<Vec<Event>> {
        self.pages.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn search(&self, _criteria: &EventCriteria) -> RepositoryResult<Vec<Event>> {
        Ok(Vec::new())
    }

    fn create(&self, event: Event) -> RepositoryResult<Event> {
        Ok(event)
    }

    fn create_or_patch(&self, event: Event) -> RepositoryResult<Event> {
        Ok(event)
    }
}

fn scripted_synchronizer(
    pages: Vec<RepositoryResult<Vec<Event>>>,
    bulk_items: usize,
) -> (Synchronizer<ApiKind>, Arc<ApiRegistry>) {
    let stores = TestStores::new();
    let registry = Arc::new(ApiRegistry::new(ShardingTags::none()));
    let resolver = Arc::new(ReferenceResolver::new(
        stores.environments.clone(),
        stores.organizations.clone(),
        16,
    ));
    let kind = ApiKind::new(registry.clone(), resolver, stores.plans.clone());
    let config = config().with_bulk_items(bulk_items);
    (
        Synchronizer::new(kind, Arc::new(ScriptedPages::new(pages)), &config),
        registry,
    )
}

#[test]
fn older_event_on_a_later_page_does_not_override() {
    let (sync, registry) = scripted_synchronizer(
        vec![
            Ok(vec![api_event(&api("api-1"), EventType::StopApi, 20)]),
            Ok(vec![api_event(&api("api-1"), EventType::StartApi, 10)]),
        ],
        1,
    );

    let report = sync.synchronize(FROM, TO, &environments()).unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.skipped, 1);
    assert!(registry.is_empty());
    assert_eq!(registry.stats().register_calls, 0);
}

#[test]
fn failure_keeps_the_pages_already_applied() {
    let (sync, registry) = scripted_synchronizer(
        vec![
            Ok(vec![api_event(&api("api-1"), EventType::StartApi, 10)]),
            Err(RepositoryError::unavailable("event", "connection reset")),
        ],
        1,
    );

    let err = sync.synchronize(FROM, TO, &environments()).unwrap_err();

    assert!(err.is_transient());
    assert!(registry.contains("api-1"));
    assert_eq!(sync.stats().failed_runs, 1);
}

#[test]
fn undecodable_payload_does_not_block_the_page() {
    let broken = Event::new(EventType::StartApi, 10)
        .with_property(EventProperty::ApiId, "api-1")
        .with_environment(ENV_A)
        .with_payload("{not json");
    let stores = TestStores::with_events([
        broken,
        api_event(&api("api-2"), EventType::StartApi, 11),
    ]);
    let gateway = gateway(&stores, config());

    let report = gateway
        .api_synchronizer()
        .synchronize(FROM, TO, &environments())
        .unwrap();

    assert_eq!(report.failed, 1);
    assert!(gateway.apis().contains("api-2"));
}

#[tokio::test]
async fn scheduler_runs_every_job_and_advances_checkpoints() {
    let stores = TestStores::with_events([
        api_event(&api("api-1"), EventType::StartApi, 10),
        organization_event(&organization("org-2", "beta"), 10),
    ]);
    let gateway = gateway(&stores, config());
    let mut scheduler = gateway.scheduler();

    let reports = scheduler.synchronize_all_once().await.unwrap();

    let names: Vec<_> = reports.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, ["organization", "dictionary", "shared-policy-group", "api"]);
    assert!(gateway.apis().contains("api-1"));
    assert!(gateway.organizations().get("org-2").is_some());
    assert!(scheduler.checkpoint("api").unwrap() > 0);
    scheduler.shutdown().await;
}

#[test]
fn stale_definitions_are_not_counted_as_registered() {
    let stores = TestStores::with_events([
        dictionary_event(&dictionary("dict-1"), EventType::PublishDictionary, 10),
        shared_policy_group_event(
            &shared_policy_group("spg-1", ENV_A).deploy(100),
            EventType::DeploySharedPolicyGroup,
            100,
        ),
    ]);
    let gateway = gateway(&stores, config());
    assert!(gateway
        .dictionaries()
        .register(ReactableDictionary::new(dictionary("dict-1").with_deployed_at(50))));
    assert!(gateway.shared_policy_groups().register(ReactableSharedPolicyGroup::new(
        shared_policy_group("spg-1", ENV_A).deploy(200)
    )));

    let reports = gateway.synchronize_once(FROM, TO).unwrap();

    for (job, report) in &reports {
        assert_eq!(report.registered, 0, "{job}");
    }
    assert_eq!(gateway.dictionaries().get("dict-1").unwrap().definition.deployed_at, 50);
    assert_eq!(
        gateway
            .shared_policy_groups()
            .get("spg-1", ENV_A)
            .unwrap()
            .definition
            .updated_at,
        200
    );
}

#[derive(Default)]
struct RecordingDebugHandler {
    seen: Mutex<Vec<String>>,
}

impl DebugHandler for RecordingDebugHandler {
    fn handle(&self, event: &Event, api: &ReactableApi) -> bool {
        self.seen
            .lock()
            .push(format!("{}:{}", event.id, api.definition.id));
        true
    }
}

#[test]
fn debug_requests_run_after_the_other_jobs() {
    let request = api_event(&api("api-9"), EventType::DebugApi, 10)
        .with_id("debug-1")
        .with_property(EventProperty::ApiDebugStatus, DEBUG_STATUS_TO_DEBUG);
    let stores = TestStores::with_events([
        request,
        api_event(&api("api-1"), EventType::StartApi, 10),
    ]);
    let handler = Arc::new(RecordingDebugHandler::default());
    let gateway = gateway(&stores, config()).with_debug_handler(handler.clone());

    let names: Vec<_> = gateway.jobs().iter().map(|job| job.name()).collect();
    assert_eq!(
        names,
        ["organization", "dictionary", "shared-policy-group", "api", "debug"]
    );

    let reports = gateway.synchronize_once(FROM, TO).unwrap();
    let (_, debug) = reports.last().unwrap();
    assert_eq!(debug.fetched, 1);
    assert_eq!(debug.registered, 1);
    assert_eq!(*handler.seen.lock(), ["debug-1:api-9"]);
    assert!(gateway.apis().contains("api-1"));
    assert!(!gateway.apis().contains("api-9"));

    let patched = stores
        .events
        .events()
        .into_iter()
        .find(|event| event.id == "debug-1")
        .unwrap();
    assert_eq!(
        patched.property(EventProperty::ApiDebugStatus),
        Some(DEBUG_STATUS_DEBUGGING)
    );

    let again = gateway.synchronize_once(FROM, TO).unwrap();
    assert_eq!(again.last().unwrap().1.fetched, 0);
    assert_eq!(handler.seen.lock().len(), 1);
}

fn mixed_history() -> Vec<Event> {
    (0..60)
        .map(|i| {
            let event_type = if i % 3 == 0 {
                EventType::StopApi
            } else {
                EventType::StartApi
            };
            api_event(&api(&format!("api-{i}")), event_type, 10 + i)
        })
        .collect()
}

#[test]
fn concurrent_runs_over_the_same_window_converge() {
    let single = TestStores::with_events(mixed_history());
    let reference = gateway(&single, config().with_bulk_items(7));
    let expected = reference
        .api_synchronizer()
        .synchronize(FROM, TO, &environments())
        .unwrap();
    assert_eq!(expected.registered, 40);

    let stores = TestStores::with_events(mixed_history());
    let shared = gateway(&stores, config().with_bulk_items(7));
    let registered: usize = std::thread::scope(|scope| {
        let runs: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    shared
                        .api_synchronizer()
                        .synchronize(FROM, TO, &environments())
                        .unwrap()
                })
            })
            .collect();
        runs.into_iter()
            .map(|run| run.join().unwrap().registered)
            .sum()
    });

    assert_eq!(registered, expected.registered);
    let ids = |gateway: &GatewaySync| {
        let mut apis = gateway.apis().apis();
        apis.sort_by(|a, b| a.definition.id.cmp(&b.definition.id));
        apis
    };
    assert_eq!(ids(&shared), ids(&reference));
    assert_eq!(shared.apis().len(), 40);
}
