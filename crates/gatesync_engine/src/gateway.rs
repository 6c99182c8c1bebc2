//! Wiring of the synchronizers of one gateway node.

use crate::config::SyncConfig;
use crate::debug::{DebugEventDispatcher, DebugHandler};
use crate::error::SyncResult;
use crate::kinds::{
    ApiDeploymentListener, ApiKind, DictionaryKind, OrganizationKind, SharedPolicyGroupKind,
};
use crate::policy::SharedPolicyGroupPolicyResolver;
use crate::reference::ReferenceResolver;
use crate::registry::{
    ApiRegistry, DictionaryRegistry, OrganizationRegistry, SharedPolicyGroupRegistry,
};
use crate::scheduler::{SyncJob, SyncScheduler};
use crate::synchronizer::{SyncReport, Synchronizer};
use gatesync_repository::{
    EnvironmentRepository, EventRepository, OrganizationRepository, PlanRepository,
    SnapshotRepositories,
};
use std::sync::Arc;
use tracing::info;

/// Stores a gateway reads from.
#[derive(Clone)]
pub struct GatewayStores {
    /// The event log.
    pub events: Arc<dyn EventRepository>,
    /// Environment lookups for the reference cache.
    pub environments: Arc<dyn EnvironmentRepository>,
    /// Organization lookups for the reference cache.
    pub organizations: Arc<dyn OrganizationRepository>,
    /// Plans of legacy API definitions.
    pub plans: Arc<dyn PlanRepository>,
}

impl From<SnapshotRepositories> for GatewayStores {
    fn from(repositories: SnapshotRepositories) -> Self {
        Self {
            events: repositories.events,
            environments: repositories.environments,
            organizations: repositories.organizations,
            plans: repositories.plans,
        }
    }
}

/// The registries, caches and synchronizers of one gateway node.
///
/// Synchronizers share the reference cache and each feed their own registry.
pub struct GatewaySync {
    config: SyncConfig,
    resolver: Arc<ReferenceResolver>,
    apis: Arc<ApiRegistry>,
    dictionaries: Arc<DictionaryRegistry>,
    organizations: Arc<OrganizationRegistry>,
    shared_policy_groups: Arc<SharedPolicyGroupRegistry>,
    api_sync: Arc<Synchronizer<ApiKind>>,
    dictionary_sync: Arc<Synchronizer<DictionaryKind>>,
    organization_sync: Arc<Synchronizer<OrganizationKind>>,
    shared_policy_group_sync: Arc<Synchronizer<SharedPolicyGroupKind>>,
    events: Arc<dyn EventRepository>,
    debug: Option<Arc<DebugEventDispatcher>>,
}

impl GatewaySync {
    /// Validates `config` and builds every synchronizer.
    pub fn new(config: SyncConfig, stores: GatewayStores) -> SyncResult<Self> {
        Self::with_listeners(config, stores, Vec::new())
    }

    /// Like [`GatewaySync::new`], notifying `listeners` of API deployments.
    pub fn with_listeners(
        config: SyncConfig,
        stores: GatewayStores,
        listeners: Vec<Arc<dyn ApiDeploymentListener>>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let tags = config.parsed_sharding_tags()?;

        let resolver = Arc::new(ReferenceResolver::new(
            stores.environments.clone(),
            stores.organizations.clone(),
            config.reference_cache_capacity,
        ));
        let apis = Arc::new(ApiRegistry::new(tags));
        let dictionaries = Arc::new(DictionaryRegistry::new());
        let organizations = Arc::new(OrganizationRegistry::new());
        let shared_policy_groups = Arc::new(SharedPolicyGroupRegistry::new());

        let api_kind = listeners.into_iter().fold(
            ApiKind::new(apis.clone(), resolver.clone(), stores.plans.clone()),
            ApiKind::with_listener,
        );
        let api_sync = Arc::new(Synchronizer::new(api_kind, stores.events.clone(), &config));
        let dictionary_sync = Arc::new(Synchronizer::new(
            DictionaryKind::new(dictionaries.clone()),
            stores.events.clone(),
            &config,
        ));
        let organization_sync = Arc::new(Synchronizer::new(
            OrganizationKind::new(organizations.clone()),
            stores.events.clone(),
            &config,
        ));
        let shared_policy_group_sync = Arc::new(Synchronizer::new(
            SharedPolicyGroupKind::new(shared_policy_groups.clone(), resolver.clone()),
            stores.events.clone(),
            &config,
        ));

        info!(
            environments = ?config.environments,
            bulk_items = config.bulk_items,
            sharding_tags = ?config.sharding_tags,
            "gateway synchronization configured"
        );

        Ok(Self {
            config,
            resolver,
            apis,
            dictionaries,
            organizations,
            shared_policy_groups,
            api_sync,
            dictionary_sync,
            organization_sync,
            shared_policy_group_sync,
            events: stores.events,
            debug: None,
        })
    }

    /// Hands pending API debug requests to `handler` as an extra job.
    pub fn with_debug_handler(mut self, handler: Arc<dyn DebugHandler>) -> Self {
        self.debug = Some(Arc::new(DebugEventDispatcher::new(
            self.events.clone(),
            self.resolver.clone(),
            handler,
        )));
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the jobs in dependency order: organizations and dictionaries
    /// first, then shared policy groups, then the APIs that reference them.
    /// The debug dispatcher, if any, runs last.
    pub fn jobs(&self) -> Vec<Arc<dyn SyncJob>> {
        let mut jobs: Vec<Arc<dyn SyncJob>> = vec![
            self.organization_sync.clone(),
            self.dictionary_sync.clone(),
            self.shared_policy_group_sync.clone(),
            self.api_sync.clone(),
        ];
        if let Some(debug) = &self.debug {
            jobs.push(debug.clone());
        }
        jobs
    }

    /// Builds a scheduler running every job.
    pub fn scheduler(&self) -> SyncScheduler {
        let mut scheduler = SyncScheduler::new(&self.config);
        for job in self.jobs() {
            scheduler.register(job);
        }
        scheduler
    }

    /// Runs every job once over `[from, to)` on the calling thread.
    pub fn synchronize_once(&self, from: i64, to: i64) -> SyncResult<Vec<(&'static str, SyncReport)>> {
        self.jobs()
            .into_iter()
            .map(|job| {
                job.synchronize(from, to, &self.config.environments)
                    .map(|report| (job.name(), report))
            })
            .collect()
    }

    /// Returns the API registry.
    pub fn apis(&self) -> &Arc<ApiRegistry> {
        &self.apis
    }

    /// Returns the dictionary registry.
    pub fn dictionaries(&self) -> &Arc<DictionaryRegistry> {
        &self.dictionaries
    }

    /// Returns the organization registry.
    pub fn organizations(&self) -> &Arc<OrganizationRegistry> {
        &self.organizations
    }

    /// Returns the shared policy group registry.
    pub fn shared_policy_groups(&self) -> &Arc<SharedPolicyGroupRegistry> {
        &self.shared_policy_groups
    }

    /// Returns the reference cache.
    pub fn resolver(&self) -> &Arc<ReferenceResolver> {
        &self.resolver
    }

    /// Returns the API synchronizer.
    pub fn api_synchronizer(&self) -> &Arc<Synchronizer<ApiKind>> {
        &self.api_sync
    }

    /// Returns the dictionary synchronizer.
    pub fn dictionary_synchronizer(&self) -> &Arc<Synchronizer<DictionaryKind>> {
        &self.dictionary_sync
    }

    /// Returns the organization synchronizer.
    pub fn organization_synchronizer(&self) -> &Arc<Synchronizer<OrganizationKind>> {
        &self.organization_sync
    }

    /// Returns the shared policy group synchronizer.
    pub fn shared_policy_group_synchronizer(&self) -> &Arc<Synchronizer<SharedPolicyGroupKind>> {
        &self.shared_policy_group_sync
    }

    /// Returns a step expander backed by the shared policy group registry.
    pub fn policy_resolver(&self) -> SharedPolicyGroupPolicyResolver {
        SharedPolicyGroupPolicyResolver::new(self.shared_policy_groups.clone())
    }
}
