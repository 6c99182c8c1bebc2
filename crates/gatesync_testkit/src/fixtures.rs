//! Test fixtures and store helpers.
//!
//! Provides builders for definitions and their events, and in-memory
//! stores seeded with a small organization hierarchy.

use gatesync_protocol::{
    encode_payload, ApiDefinition, DefinitionVersion, DictionaryDefinition, Event, EventProperty,
    EventType, FlowPhase, LifecycleState, OrganizationDefinition, Plan, PlanStatus,
    SharedPolicyGroup, Step,
};
use gatesync_repository::{
    Environment, EventRepository, InMemoryEnvironmentRepository, InMemoryEventRepository,
    InMemoryOrganizationRepository, InMemoryPlanRepository, Organization, SnapshotRepositories,
};
use std::sync::Arc;

/// First seeded environment.
pub const ENV_A: &str = "env-A";
/// Second seeded environment.
pub const ENV_B: &str = "env-B";
/// Human-readable ID of [`ENV_A`].
pub const ENV_A_HRID: &str = "dev";
/// Human-readable ID of [`ENV_B`].
pub const ENV_B_HRID: &str = "prod";
/// Organization owning both seeded environments.
pub const ORGANIZATION: &str = "org-1";
/// Human-readable ID of [`ORGANIZATION`].
pub const ORGANIZATION_HRID: &str = "acme";

/// A deployable V4 API in [`ENV_A`] with one published plan.
pub fn api(id: &str) -> ApiDefinition {
    ApiDefinition::new(id, DefinitionVersion::V4)
        .with_environment(ENV_A)
        .with_deployed_at(1)
        .with_plan(Plan::new(format!("{id}-plan"), id, PlanStatus::Published))
}

/// A V1 API in [`ENV_A`] whose plans live in the plan store.
pub fn legacy_api(id: &str) -> ApiDefinition {
    ApiDefinition::new(id, DefinitionVersion::V1)
        .with_environment(ENV_A)
        .with_deployed_at(1)
}

/// A published plan of a legacy API.
pub fn legacy_plan(api_id: &str) -> Plan {
    Plan::new(format!("{api_id}-plan"), api_id, PlanStatus::Published)
}

/// An API event targeting the definition's environment, or [`ENV_A`].
pub fn api_event(api: &ApiDefinition, event_type: EventType, created_at: i64) -> Event {
    let environment = api.environment_id.as_deref().unwrap_or(ENV_A);
    Event::new(event_type, created_at)
        .with_property(EventProperty::ApiId, api.id.clone())
        .with_environment(environment)
        .with_payload(encode_payload(api).expect("Failed to encode api"))
}

/// A dictionary in [`ENV_A`] with a single entry.
pub fn dictionary(id: &str) -> DictionaryDefinition {
    let mut dictionary = DictionaryDefinition::new(id, format!("{id}-key"))
        .with_deployed_at(1)
        .with_entry("region", "eu-west");
    dictionary.environment_id = Some(ENV_A.to_string());
    dictionary
}

/// A dictionary event targeting [`ENV_A`].
pub fn dictionary_event(
    dictionary: &DictionaryDefinition,
    event_type: EventType,
    created_at: i64,
) -> Event {
    Event::new(event_type, created_at)
        .with_property(EventProperty::DictionaryId, dictionary.id.clone())
        .with_environment(dictionary.environment_id.as_deref().unwrap_or(ENV_A))
        .with_payload(encode_payload(dictionary).expect("Failed to encode dictionary"))
}

/// An organization with one human-readable ID.
pub fn organization(id: &str, hrid: &str) -> OrganizationDefinition {
    let mut organization = OrganizationDefinition::new(id, hrid);
    organization.hrids.push(hrid.to_string());
    organization
}

/// A PUBLISH_ORGANIZATION event. Organization events target no environment.
pub fn organization_event(organization: &OrganizationDefinition, created_at: i64) -> Event {
    Event::new(EventType::PublishOrganization, created_at)
        .with_property(EventProperty::OrganizationId, organization.id.clone())
        .with_payload(encode_payload(organization).expect("Failed to encode organization"))
}

/// An undeployed shared policy group with one request step.
pub fn shared_policy_group(cross_id: &str, environment_id: &str) -> SharedPolicyGroup {
    SharedPolicyGroup {
        id: format!("{cross_id}-{environment_id}"),
        cross_id: cross_id.to_string(),
        environment_id: environment_id.to_string(),
        organization_id: ORGANIZATION.to_string(),
        name: cross_id.to_string(),
        description: None,
        version: 0,
        lifecycle_state: LifecycleState::Undeployed,
        phase: FlowPhase::Request,
        steps: vec![Step::new("rate-limit", "rate-limit")],
        deployed_at: None,
        created_at: 1,
        updated_at: 1,
    }
}

/// A shared policy group event keyed by cross ID.
pub fn shared_policy_group_event(
    group: &SharedPolicyGroup,
    event_type: EventType,
    created_at: i64,
) -> Event {
    Event::new(event_type, created_at)
        .with_property(EventProperty::SharedPolicyGroupId, group.cross_id.clone())
        .with_environment(group.environment_id.clone())
        .with_payload(encode_payload(group).expect("Failed to encode shared policy group"))
}

/// In-memory stores seeded with [`ENV_A`] and [`ENV_B`] under [`ORGANIZATION`].
pub struct TestStores {
    /// The event log.
    pub events: Arc<InMemoryEventRepository>,
    /// Environment rows.
    pub environments: Arc<InMemoryEnvironmentRepository>,
    /// Organization rows.
    pub organizations: Arc<InMemoryOrganizationRepository>,
    /// Plans of legacy APIs.
    pub plans: Arc<InMemoryPlanRepository>,
}

impl TestStores {
    /// Creates seeded stores with an empty event log.
    pub fn new() -> Self {
        Self::with_events(Vec::new())
    }

    /// Creates seeded stores whose event log holds `events`.
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let environments = InMemoryEnvironmentRepository::new();
        environments.insert(Environment::new(ENV_A, ORGANIZATION, ENV_A_HRID));
        environments.insert(Environment::new(ENV_B, ORGANIZATION, ENV_B_HRID));
        let organizations = InMemoryOrganizationRepository::new();
        organizations.insert(Organization::new(ORGANIZATION, ORGANIZATION_HRID));

        Self {
            events: Arc::new(InMemoryEventRepository::with_events(events)),
            environments: Arc::new(environments),
            organizations: Arc::new(organizations),
            plans: Arc::new(InMemoryPlanRepository::new()),
        }
    }

    /// Appends an event to the log.
    pub fn publish(&self, event: Event) {
        self.events.create(event).expect("Failed to publish event");
    }

    /// Returns the stores as repository handles.
    pub fn repositories(&self) -> SnapshotRepositories {
        SnapshotRepositories {
            events: self.events.clone(),
            environments: self.environments.clone(),
            organizations: self.organizations.clone(),
            plans: self.plans.clone(),
        }
    }
}

impl Default for TestStores {
    fn default() -> Self {
        Self::new()
    }
}
