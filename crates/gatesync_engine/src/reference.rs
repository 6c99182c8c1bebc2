//! Environment and organization reference cache.

use crate::error::SyncResult;
use dashmap::DashMap;
use gatesync_repository::{EnvironmentRepository, OrganizationRepository};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Identifiers resolved for one environment.
///
/// Fields stay `None` when the environment or its organization does not
/// exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// Environment ID the entry was resolved for.
    pub environment_id: String,
    /// Environment human-readable ID.
    pub environment_hrid: Option<String>,
    /// Owning organization ID.
    pub organization_id: Option<String>,
    /// Organization human-readable ID.
    pub organization_hrid: Option<String>,
}

impl ReferenceEntry {
    /// Creates an entry for an environment that could not be found.
    pub fn unresolved(environment_id: impl Into<String>) -> Self {
        Self {
            environment_id: environment_id.into(),
            ..Self::default()
        }
    }

    /// Returns true if the environment was found.
    pub fn is_resolved(&self) -> bool {
        self.environment_hrid.is_some() || self.organization_id.is_some()
    }
}

type Slot = Arc<Mutex<Option<Arc<ReferenceEntry>>>>;

/// Resolves environment IDs to their organization and human-readable IDs.
///
/// Entries are loaded lazily, never expire and are never invalidated: a
/// changed hierarchy is only observed after a restart. Misses are cached as
/// unresolved entries; store failures are not cached. Population locks the
/// missing key only.
pub struct ReferenceResolver {
    environments: Arc<dyn EnvironmentRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    cache: DashMap<String, Slot>,
    capacity: usize,
}

impl ReferenceResolver {
    /// Creates a resolver caching at most `capacity` environments.
    pub fn new(
        environments: Arc<dyn EnvironmentRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        capacity: usize,
    ) -> Self {
        Self {
            environments,
            organizations,
            cache: DashMap::new(),
            capacity,
        }
    }

    /// Number of cached environments.
    pub fn cached(&self) -> usize {
        self.cache
            .iter()
            .filter(|slot| slot.value().lock().is_some())
            .count()
    }

    /// Resolves an environment, querying the stores on the first call only.
    pub fn resolve(&self, environment_id: &str) -> SyncResult<Arc<ReferenceEntry>> {
        let slot = match self.slot(environment_id) {
            Some(slot) => slot,
            None => {
                debug!(environment_id, "reference cache full, resolving without caching");
                return self.load(environment_id).map(Arc::new);
            }
        };

        let mut guard = slot.lock();
        if let Some(entry) = guard.as_ref() {
            return Ok(entry.clone());
        }
        let entry = Arc::new(self.load(environment_id)?);
        *guard = Some(entry.clone());
        Ok(entry)
    }

    fn slot(&self, environment_id: &str) -> Option<Slot> {
        if let Some(slot) = self.cache.get(environment_id) {
            return Some(slot.value().clone());
        }
        if self.cache.len() >= self.capacity {
            return None;
        }
        Some(
            self.cache
                .entry(environment_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .value()
                .clone(),
        )
    }

    fn load(&self, environment_id: &str) -> SyncResult<ReferenceEntry> {
        let Some(environment) = self.environments.find_by_id(environment_id)? else {
            debug!(environment_id, "environment not found, caching as unresolved");
            return Ok(ReferenceEntry::unresolved(environment_id));
        };

        let mut entry = ReferenceEntry {
            environment_id: environment_id.to_string(),
            environment_hrid: environment.hrid().map(str::to_string),
            organization_id: None,
            organization_hrid: None,
        };
        match self.organizations.find_by_id(&environment.organization_id)? {
            Some(organization) => {
                entry.organization_id = Some(organization.id.clone());
                entry.organization_hrid = organization.hrid().map(str::to_string);
            }
            None => debug!(
                environment_id,
                organization_id = %environment.organization_id,
                "organization not found"
            ),
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatesync_repository::{
        Environment, InMemoryEnvironmentRepository, InMemoryOrganizationRepository, Organization,
    };

    fn stores() -> (
        Arc<InMemoryEnvironmentRepository>,
        Arc<InMemoryOrganizationRepository>,
    ) {
        let environments = Arc::new(InMemoryEnvironmentRepository::new());
        environments.insert(Environment::new("env-A", "org-1", "dev"));
        environments.insert(Environment::new("env-B", "org-missing", "prod"));
        let organizations = Arc::new(InMemoryOrganizationRepository::new());
        organizations.insert(Organization::new("org-1", "acme"));
        (environments, organizations)
    }

    #[test]
    fn resolves_once_per_environment() {
        let (environments, organizations) = stores();
        let resolver = ReferenceResolver::new(environments.clone(), organizations.clone(), 16);

        for _ in 0..10 {
            let entry = resolver.resolve("env-A").unwrap();
            assert_eq!(entry.environment_hrid.as_deref(), Some("dev"));
            assert_eq!(entry.organization_id.as_deref(), Some("org-1"));
            assert_eq!(entry.organization_hrid.as_deref(), Some("acme"));
        }
        assert_eq!(environments.lookups(), 1);
        assert_eq!(organizations.lookups(), 1);
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn missing_organization_is_a_partial_entry() {
        let (environments, organizations) = stores();
        let resolver = ReferenceResolver::new(environments, organizations.clone(), 16);

        let entry = resolver.resolve("env-B").unwrap();
        assert_eq!(entry.environment_hrid.as_deref(), Some("prod"));
        assert_eq!(entry.organization_id, None);
        assert_eq!(entry.organization_hrid, None);
        resolver.resolve("env-B").unwrap();
        assert_eq!(organizations.lookups(), 1);
    }

    #[test]
    fn missing_environment_is_cached_as_unresolved() {
        let (environments, organizations) = stores();
        let resolver = ReferenceResolver::new(environments.clone(), organizations.clone(), 16);

        let entry = resolver.resolve("env-X").unwrap();
        assert!(!entry.is_resolved());
        resolver.resolve("env-X").unwrap();
        assert_eq!(environments.lookups(), 1);
        assert_eq!(organizations.lookups(), 0);
    }

    #[test]
    fn failures_are_not_cached() {
        let (environments, organizations) = stores();
        let resolver = ReferenceResolver::new(environments.clone(), organizations, 16);

        environments.set_unavailable(true);
        assert!(resolver.resolve("env-A").is_err());
        environments.set_unavailable(false);
        assert!(resolver.resolve("env-A").unwrap().is_resolved());
        assert_eq!(environments.lookups(), 2);
    }

    #[test]
    fn full_cache_still_resolves() {
        let (environments, organizations) = stores();
        let resolver = ReferenceResolver::new(environments.clone(), organizations, 1);

        resolver.resolve("env-A").unwrap();
        resolver.resolve("env-B").unwrap();
        resolver.resolve("env-B").unwrap();
        assert_eq!(resolver.cached(), 1);
        assert_eq!(environments.lookups(), 3);
    }

    #[test]
    fn concurrent_resolution_queries_once() {
        let (environments, organizations) = stores();
        let resolver = Arc::new(ReferenceResolver::new(
            environments.clone(),
            organizations,
            16,
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                std::thread::spawn(move || resolver.resolve("env-A").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(environments.lookups(), 1);
    }
}
