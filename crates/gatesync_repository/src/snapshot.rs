//! JSON snapshot of an event log and its reference data.

use crate::error::RepositoryResult;
use crate::event::InMemoryEventRepository;
use crate::plan::InMemoryPlanRepository;
use crate::reference::{
    Environment, InMemoryEnvironmentRepository, InMemoryOrganizationRepository, Organization,
};
use gatesync_protocol::{Event, Plan};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Serialized content of the stores a gateway reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Events in insertion order.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Environment rows.
    #[serde(default)]
    pub environments: Vec<Environment>,
    /// Organization rows.
    #[serde(default)]
    pub organizations: Vec<Organization>,
    /// Plans of legacy APIs.
    #[serde(default)]
    pub plans: Vec<Plan>,
}

/// In-memory stores loaded from a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotRepositories {
    /// Event log.
    pub events: Arc<InMemoryEventRepository>,
    /// Environment rows.
    pub environments: Arc<InMemoryEnvironmentRepository>,
    /// Organization rows.
    pub organizations: Arc<InMemoryOrganizationRepository>,
    /// Plans.
    pub plans: Arc<InMemoryPlanRepository>,
}

impl Snapshot {
    /// Reads a snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the snapshot as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> RepositoryResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Builds in-memory stores holding the snapshot content.
    pub fn into_repositories(self) -> SnapshotRepositories {
        let environments = InMemoryEnvironmentRepository::new();
        for environment in self.environments {
            environments.insert(environment);
        }
        let organizations = InMemoryOrganizationRepository::new();
        for organization in self.organizations {
            organizations.insert(organization);
        }
        SnapshotRepositories {
            events: Arc::new(InMemoryEventRepository::with_events(self.events)),
            environments: Arc::new(environments),
            organizations: Arc::new(organizations),
            plans: Arc::new(InMemoryPlanRepository::with_plans(self.plans)),
        }
    }
}
