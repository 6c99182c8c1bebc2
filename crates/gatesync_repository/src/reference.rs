//! Environment and organization lookups.

use crate::availability::Availability;
use crate::error::RepositoryResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An environment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Environment ID.
    pub id: String,
    /// Owning organization ID.
    pub organization_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Human-readable identifiers; the first one is canonical.
    #[serde(default)]
    pub hrids: Vec<String>,
}

impl Environment {
    /// Creates an environment with one human-readable identifier.
    pub fn new(
        id: impl Into<String>,
        organization_id: impl Into<String>,
        hrid: impl Into<String>,
    ) -> Self {
        let hrid = hrid.into();
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            name: hrid.clone(),
            hrids: vec![hrid],
        }
    }

    /// Returns the canonical human-readable identifier.
    pub fn hrid(&self) -> Option<&str> {
        self.hrids.first().map(String::as_str)
    }
}

/// An organization row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Organization ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Human-readable identifiers; the first one is canonical.
    #[serde(default)]
    pub hrids: Vec<String>,
}

impl Organization {
    /// Creates an organization with one human-readable identifier.
    pub fn new(id: impl Into<String>, hrid: impl Into<String>) -> Self {
        let hrid = hrid.into();
        Self {
            id: id.into(),
            name: hrid.clone(),
            hrids: vec![hrid],
        }
    }

    /// Returns the canonical human-readable identifier.
    pub fn hrid(&self) -> Option<&str> {
        self.hrids.first().map(String::as_str)
    }
}

/// Environment lookups.
pub trait EnvironmentRepository: Send + Sync {
    /// Returns the environment with the given ID.
    fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Environment>>;
}

/// Organization lookups.
pub trait OrganizationRepository: Send + Sync {
    /// Returns the organization with the given ID.
    fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Organization>>;
}

/// An in-memory environment store that counts lookups.
#[derive(Debug, Default)]
pub struct InMemoryEnvironmentRepository {
    rows: RwLock<HashMap<String, Environment>>,
    lookups: AtomicUsize,
    availability: Availability,
}

impl InMemoryEnvironmentRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an environment.
    pub fn insert(&self, environment: Environment) {
        self.rows
            .write()
            .insert(environment.id.clone(), environment);
    }

    /// Number of `find_by_id` calls.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Makes every call fail with an unavailable error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.availability.set_unavailable(unavailable);
    }
}

impl EnvironmentRepository for InMemoryEnvironmentRepository {
    fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Environment>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.availability.check("environment")?;
        Ok(self.rows.read().get(id).cloned())
    }
}

/// An in-memory organization store that counts lookups.
#[derive(Debug, Default)]
pub struct InMemoryOrganizationRepository {
    rows: RwLock<HashMap<String, Organization>>,
    lookups: AtomicUsize,
    availability: Availability,
}

impl InMemoryOrganizationRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an organization.
    pub fn insert(&self, organization: Organization) {
        self.rows
            .write()
            .insert(organization.id.clone(), organization);
    }

    /// Number of `find_by_id` calls.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Makes every call fail with an unavailable error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.availability.set_unavailable(unavailable);
    }
}

impl OrganizationRepository for InMemoryOrganizationRepository {
    fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Organization>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.availability.check("organization")?;
        Ok(self.rows.read().get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_counted() {
        let environments = InMemoryEnvironmentRepository::new();
        environments.insert(Environment::new("env-A", "org-1", "dev"));

        let found = environments.find_by_id("env-A").unwrap().unwrap();
        assert_eq!(found.hrid(), Some("dev"));
        assert!(environments.find_by_id("env-B").unwrap().is_none());
        assert_eq!(environments.lookups(), 2);
    }

    #[test]
    fn empty_hrids_have_no_canonical_value() {
        let organization = Organization {
            id: "org-1".into(),
            name: "Acme".into(),
            hrids: Vec::new(),
        };
        assert_eq!(organization.hrid(), None);
    }

    #[test]
    fn unavailable_organization_store() {
        let organizations = InMemoryOrganizationRepository::new();
        organizations.set_unavailable(true);
        assert!(organizations.find_by_id("org-1").unwrap_err().is_transient());
    }
}
