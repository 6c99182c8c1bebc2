use super::{ReactableOrganization, RegistryCounters, RegistryStats};
use dashmap::DashMap;
use tracing::info;

/// Organizations whose platform flows apply on this gateway.
#[derive(Debug, Default)]
pub struct OrganizationRegistry {
    organizations: DashMap<String, ReactableOrganization>,
    counters: RegistryCounters,
}

impl OrganizationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys or replaces an organization. Returns true if it changed.
    pub fn register(&self, organization: ReactableOrganization) -> bool {
        self.counters.registered();
        let id = organization.definition.id.clone();
        let previous = self.organizations.insert(id.clone(), organization.clone());
        let changed = previous.as_ref() != Some(&organization);
        if changed {
            info!(organization_id = %id, "deploying organization");
        }
        changed
    }

    /// Removes an organization. Returns false if it was not deployed.
    pub fn unregister(&self, organization_id: &str) -> bool {
        self.counters.unregistered();
        self.organizations.remove(organization_id).is_some()
    }

    /// Returns a deployed organization.
    pub fn get(&self, organization_id: &str) -> Option<ReactableOrganization> {
        self.organizations
            .get(organization_id)
            .map(|o| o.value().clone())
    }

    /// Returns every deployed organization, sorted by ID.
    pub fn organizations(&self) -> Vec<ReactableOrganization> {
        let mut all: Vec<_> = self.organizations.iter().map(|o| o.value().clone()).collect();
        all.sort_by(|a, b| a.definition.id.cmp(&b.definition.id));
        all
    }

    /// Number of deployed organizations.
    pub fn len(&self) -> usize {
        self.organizations.len()
    }

    /// Returns true if no organization is deployed.
    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
    }

    /// Returns the call counts.
    pub fn stats(&self) -> RegistryStats {
        self.counters.snapshot()
    }
}
