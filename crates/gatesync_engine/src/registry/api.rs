use super::{ReactableApi, RegistryCounters, RegistryStats};
use crate::tags::ShardingTags;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

/// What registering an API does to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOnApi {
    /// The API is deployed or replaced.
    Deploy,
    /// The deployed API is removed.
    Undeploy,
    /// Nothing changes.
    None,
}

/// APIs deployed on this gateway.
///
/// An API is deployable when it is enabled, its tags match the gateway's
/// sharding tags and it has at least one published or deprecated plan whose
/// own tags match as well.
#[derive(Debug)]
pub struct ApiRegistry {
    apis: DashMap<String, ReactableApi>,
    tags: ShardingTags,
    counters: RegistryCounters,
}

impl ApiRegistry {
    /// Creates an empty registry for a gateway with the given tags.
    pub fn new(tags: ShardingTags) -> Self {
        Self {
            apis: DashMap::new(),
            tags,
            counters: RegistryCounters::default(),
        }
    }

    /// Decides what registering `api` would do.
    pub fn required_action_for(&self, api: &ReactableApi) -> ActionOnApi {
        let current = self.apis.get(&api.definition.id);
        self.decide(current.as_deref(), api)
    }

    /// Deploys, replaces or undeploys `api` and returns what was done.
    pub fn register(&self, api: ReactableApi) -> ActionOnApi {
        self.counters.registered();
        let id = api.definition.id.clone();
        match self.apis.entry(id.clone()) {
            Entry::Occupied(mut entry) => match self.decide(Some(entry.get()), &api) {
                ActionOnApi::Deploy => {
                    info!(api_id = %id, revision = ?api.definition.revision, "updating api");
                    entry.insert(api);
                    ActionOnApi::Deploy
                }
                ActionOnApi::Undeploy => {
                    info!(api_id = %id, "api is no longer deployable on this gateway, undeploying");
                    entry.remove();
                    ActionOnApi::Undeploy
                }
                ActionOnApi::None => ActionOnApi::None,
            },
            Entry::Vacant(entry) => match self.decide(None, &api) {
                ActionOnApi::Deploy => {
                    info!(api_id = %id, "deploying api");
                    entry.insert(api);
                    ActionOnApi::Deploy
                }
                _ => {
                    debug!(api_id = %id, "api is not deployable on this gateway");
                    ActionOnApi::None
                }
            },
        }
    }

    /// Removes an API. Returns false if it was not deployed.
    pub fn unregister(&self, api_id: &str) -> bool {
        self.counters.unregistered();
        let removed = self.apis.remove(api_id).is_some();
        if removed {
            info!(api_id, "undeploying api");
        }
        removed
    }

    /// Returns a deployed API.
    pub fn get(&self, api_id: &str) -> Option<ReactableApi> {
        self.apis.get(api_id).map(|api| api.value().clone())
    }

    /// Returns true if the API is deployed.
    pub fn contains(&self, api_id: &str) -> bool {
        self.apis.contains_key(api_id)
    }

    /// Returns every deployed API, sorted by ID.
    pub fn apis(&self) -> Vec<ReactableApi> {
        let mut apis: Vec<ReactableApi> = self.apis.iter().map(|a| a.value().clone()).collect();
        apis.sort_by(|a, b| a.definition.id.cmp(&b.definition.id));
        apis
    }

    /// Number of deployed APIs.
    pub fn len(&self) -> usize {
        self.apis.len()
    }

    /// Returns true if no API is deployed.
    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }

    /// Returns the call counts.
    pub fn stats(&self) -> RegistryStats {
        self.counters.snapshot()
    }

    fn decide(&self, current: Option<&ReactableApi>, api: &ReactableApi) -> ActionOnApi {
        let deployable = self.is_deployable(api);
        match current {
            None if deployable => ActionOnApi::Deploy,
            None => ActionOnApi::None,
            Some(_) if !deployable => ActionOnApi::Undeploy,
            Some(current) => {
                let newer = api.definition.deployed_at > current.definition.deployed_at;
                let same_revision = matches!(
                    (&api.definition.revision, &current.definition.revision),
                    (Some(new), Some(old)) if new == old
                );
                if newer && !same_revision {
                    ActionOnApi::Deploy
                } else {
                    ActionOnApi::None
                }
            }
        }
    }

    fn is_deployable(&self, api: &ReactableApi) -> bool {
        let definition = &api.definition;
        definition.enabled
            && self.tags.matches(&definition.tags)
            && definition.plans.iter().any(|plan| {
                plan.is_active() && (plan.tags.is_empty() || self.tags.matches(&plan.tags))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatesync_protocol::{ApiDefinition, DefinitionVersion, Plan, PlanStatus};

    fn api(id: &str) -> ReactableApi {
        ReactableApi::new(
            ApiDefinition::new(id, DefinitionVersion::V4)
                .with_deployed_at(1_000)
                .with_plan(Plan::new(format!("{id}-plan"), id, PlanStatus::Published)),
        )
    }

    fn registry(tags: &[&str]) -> ApiRegistry {
        ApiRegistry::new(ShardingTags::parse(tags).unwrap())
    }

    #[test]
    fn deploys_api_with_plan() {
        let registry = registry(&[]);
        assert_eq!(registry.register(api("api-1")), ActionOnApi::Deploy);
        assert!(registry.contains("api-1"));
    }

    #[test]
    fn does_not_deploy_disabled_api() {
        let registry = registry(&[]);
        let mut disabled = api("api-1");
        disabled.definition.enabled = false;
        assert_eq!(registry.register(disabled), ActionOnApi::None);
        assert!(registry.is_empty());
    }

    #[test]
    fn does_not_deploy_api_without_active_plan() {
        let registry = registry(&[]);
        let mut no_plan = api("api-1");
        no_plan.definition.plans.clear();
        assert_eq!(registry.register(no_plan), ActionOnApi::None);

        let mut closed = api("api-2");
        closed.definition.plans[0].status = PlanStatus::Closed;
        assert_eq!(registry.register(closed), ActionOnApi::None);

        let mut deprecated = api("api-3");
        deprecated.definition.plans[0].status = PlanStatus::Deprecated;
        assert_eq!(registry.register(deprecated), ActionOnApi::Deploy);
    }

    #[test]
    fn tag_rules() {
        let tagged_gateway = registry(&["product"]);
        assert_eq!(tagged_gateway.register(api("untagged")), ActionOnApi::None);

        let mut excluded = api("excluded");
        excluded.definition.tags = ["product", "international"].map(String::from).into();
        assert_eq!(
            registry(&["product", "!international"]).register(excluded),
            ActionOnApi::None
        );

        let mut tagged = api("tagged");
        tagged.definition.tags.insert("test".into());
        assert_eq!(registry(&[]).register(tagged), ActionOnApi::Deploy);
    }

    #[test]
    fn plan_tags_must_match() {
        let mut mismatched = api("api-1");
        mismatched.definition.tags.insert("test".into());
        mismatched.definition.plans = vec![Plan::new("p", "api-1", PlanStatus::Published).with_tag("test2")];
        assert_eq!(registry(&["test"]).register(mismatched), ActionOnApi::None);

        let mut matching = api("api-2");
        matching.definition.tags.insert("test".into());
        matching.definition.plans = vec![Plan::new("p", "api-2", PlanStatus::Published).with_tag("test")];
        assert_eq!(registry(&["test"]).register(matching), ActionOnApi::Deploy);
    }

    #[test]
    fn updates_only_newer_deployments_with_another_revision() {
        let registry = registry(&[]);
        let mut first = api("api-1");
        first.definition.revision = Some("rev1".into());
        registry.register(first.clone());

        let mut older = first.clone();
        older.definition.deployed_at = 500;
        older.definition.revision = Some("rev0".into());
        assert_eq!(registry.required_action_for(&older), ActionOnApi::None);

        let mut same_revision = first.clone();
        same_revision.definition.deployed_at = 2_000;
        assert_eq!(registry.register(same_revision), ActionOnApi::None);

        let mut newer = first.clone();
        newer.definition.deployed_at = 3_000;
        newer.definition.revision = Some("rev2".into());
        assert_eq!(registry.register(newer), ActionOnApi::Deploy);
        assert_eq!(
            registry.get("api-1").unwrap().definition.revision.as_deref(),
            Some("rev2")
        );

        assert_eq!(registry.register(first), ActionOnApi::None);
    }

    #[test]
    fn newer_deployment_without_revision_is_deployed() {
        let registry = registry(&[]);
        registry.register(api("api-1"));
        let mut newer = api("api-1");
        newer.definition.deployed_at = 2_000;
        assert_eq!(registry.register(newer), ActionOnApi::Deploy);
    }

    #[test]
    fn undeploys_api_that_is_no_longer_deployable() {
        let registry = registry(&["product"]);
        let mut tagged = api("api-1");
        tagged.definition.tags.insert("product".into());
        registry.register(tagged.clone());

        tagged.definition.tags.clear();
        assert_eq!(registry.required_action_for(&tagged), ActionOnApi::Undeploy);
        assert_eq!(registry.register(tagged), ActionOnApi::Undeploy);
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_unknown_api_is_a_no_op() {
        let registry = registry(&[]);
        assert!(!registry.unregister("missing"));
        assert_eq!(
            registry.stats(),
            RegistryStats {
                register_calls: 0,
                unregister_calls: 1
            }
        );
    }
}
