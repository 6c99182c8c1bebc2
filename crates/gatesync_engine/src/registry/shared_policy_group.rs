use super::{ReactableSharedPolicyGroup, RegistryCounters, RegistryStats};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

type GroupKey = (String, String);

/// Shared policy groups deployed on this gateway, keyed by
/// `(cross_id, environment_id)`.
#[derive(Debug, Default)]
pub struct SharedPolicyGroupRegistry {
    groups: DashMap<GroupKey, ReactableSharedPolicyGroup>,
    counters: RegistryCounters,
}

impl SharedPolicyGroupRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys a group unless a more recent definition is already active.
    ///
    /// Returns true if the registry changed.
    pub fn register(&self, group: ReactableSharedPolicyGroup) -> bool {
        self.counters.registered();
        let key = (
            group.definition.cross_id.clone(),
            group.definition.environment_id.clone(),
        );
        match self.groups.entry(key) {
            Entry::Occupied(mut entry) => {
                let current = entry.get();
                if current == &group || current.definition.updated_at > group.definition.updated_at {
                    return false;
                }
                info!(
                    cross_id = %group.definition.cross_id,
                    environment_id = %group.definition.environment_id,
                    version = group.definition.version,
                    "updating shared policy group"
                );
                entry.insert(group);
                true
            }
            Entry::Vacant(entry) => {
                info!(
                    cross_id = %group.definition.cross_id,
                    environment_id = %group.definition.environment_id,
                    version = group.definition.version,
                    "deploying shared policy group"
                );
                entry.insert(group);
                true
            }
        }
    }

    /// Removes a group from one environment. Returns false if it was absent.
    pub fn unregister(&self, cross_id: &str, environment_id: &str) -> bool {
        self.counters.unregistered();
        let removed = self
            .groups
            .remove(&(cross_id.to_string(), environment_id.to_string()))
            .is_some();
        if removed {
            info!(cross_id, environment_id, "undeploying shared policy group");
        }
        removed
    }

    /// Removes a group from every environment and returns how many were removed.
    pub fn unregister_everywhere(&self, cross_id: &str) -> usize {
        self.counters.unregistered();
        let before = self.groups.len();
        self.groups.retain(|(id, _), _| id != cross_id);
        before.saturating_sub(self.groups.len())
    }

    /// Returns the group deployed for an environment.
    pub fn get(&self, cross_id: &str, environment_id: &str) -> Option<ReactableSharedPolicyGroup> {
        self.groups
            .get(&(cross_id.to_string(), environment_id.to_string()))
            .map(|g| g.value().clone())
    }

    /// Returns every deployed group, sorted by cross ID then environment.
    pub fn groups(&self) -> Vec<ReactableSharedPolicyGroup> {
        let mut all: Vec<_> = self.groups.iter().map(|g| g.value().clone()).collect();
        all.sort_by(|a, b| {
            (&a.definition.cross_id, &a.definition.environment_id)
                .cmp(&(&b.definition.cross_id, &b.definition.environment_id))
        });
        all
    }

    /// Number of deployed groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no group is deployed.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the call counts.
    pub fn stats(&self) -> RegistryStats {
        self.counters.snapshot()
    }
}
