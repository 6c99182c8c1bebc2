//! Shared policy group records and deployment history.

use crate::availability::Availability;
use crate::error::{RepositoryError, RepositoryResult};
use gatesync_protocol::SharedPolicyGroup;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Live shared policy group records.
pub trait SharedPolicyGroupRepository: Send + Sync {
    /// Inserts a new record. Fails if the ID is already used.
    fn create(&self, group: SharedPolicyGroup) -> RepositoryResult<SharedPolicyGroup>;

    /// Returns the record with the given ID.
    fn find_by_id(&self, id: &str) -> RepositoryResult<Option<SharedPolicyGroup>>;

    /// Replaces an existing record.
    fn update(&self, group: SharedPolicyGroup) -> RepositoryResult<SharedPolicyGroup>;

    /// Removes a record. Removing a missing record is a no-op.
    fn delete(&self, id: &str) -> RepositoryResult<()>;
}

/// Append-only snapshots of every deployed or undeployed definition.
pub trait SharedPolicyGroupHistoryRepository: Send + Sync {
    /// Appends a snapshot.
    fn create(&self, snapshot: SharedPolicyGroup) -> RepositoryResult<SharedPolicyGroup>;

    /// Returns the most recent deployed snapshot of a group.
    fn find_latest_deployed(&self, group_id: &str) -> RepositoryResult<Option<SharedPolicyGroup>>;

    /// Returns every snapshot of a group, oldest first.
    fn find_by_group(&self, group_id: &str) -> RepositoryResult<Vec<SharedPolicyGroup>>;

    /// Removes every snapshot of a group and returns how many were removed.
    fn delete_by_group(&self, group_id: &str) -> RepositoryResult<usize>;
}

/// An in-memory shared policy group store.
#[derive(Debug, Default)]
pub struct InMemorySharedPolicyGroupRepository {
    rows: RwLock<HashMap<String, SharedPolicyGroup>>,
    availability: Availability,
}

impl InMemorySharedPolicyGroupRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if no record is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Makes every call fail with an unavailable error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.availability.set_unavailable(unavailable);
    }
}

impl SharedPolicyGroupRepository for InMemorySharedPolicyGroupRepository {
    fn create(&self, group: SharedPolicyGroup) -> RepositoryResult<SharedPolicyGroup> {
        self.availability.check("shared policy group")?;
        let mut rows = self.rows.write();
        if rows.contains_key(&group.id) {
            return Err(RepositoryError::Conflict(format!(
                "shared policy group {} already exists",
                group.id
            )));
        }
        rows.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    fn find_by_id(&self, id: &str) -> RepositoryResult<Option<SharedPolicyGroup>> {
        self.availability.check("shared policy group")?;
        Ok(self.rows.read().get(id).cloned())
    }

    fn update(&self, group: SharedPolicyGroup) -> RepositoryResult<SharedPolicyGroup> {
        self.availability.check("shared policy group")?;
        let mut rows = self.rows.write();
        match rows.get_mut(&group.id) {
            Some(row) => {
                *row = group.clone();
                Ok(group)
            }
            None => Err(RepositoryError::not_found("shared policy group", group.id)),
        }
    }

    fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.availability.check("shared policy group")?;
        self.rows.write().remove(id);
        Ok(())
    }
}

/// An in-memory history store.
#[derive(Debug, Default)]
pub struct InMemorySharedPolicyGroupHistoryRepository {
    snapshots: RwLock<Vec<SharedPolicyGroup>>,
    writes: AtomicUsize,
    availability: Availability,
}

impl InMemorySharedPolicyGroupHistoryRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of appended snapshots.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every call fail with an unavailable error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.availability.set_unavailable(unavailable);
    }
}

impl SharedPolicyGroupHistoryRepository for InMemorySharedPolicyGroupHistoryRepository {
    fn create(&self, snapshot: SharedPolicyGroup) -> RepositoryResult<SharedPolicyGroup> {
        self.availability.check("shared policy group history")?;
        self.snapshots.write().push(snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(snapshot)
    }

    fn find_latest_deployed(&self, group_id: &str) -> RepositoryResult<Option<SharedPolicyGroup>> {
        self.availability.check("shared policy group history")?;
        Ok(self
            .snapshots
            .read()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.id == group_id && s.is_deployed())
            .max_by_key(|(position, s)| (s.version, *position))
            .map(|(_, s)| s.clone()))
    }

    fn find_by_group(&self, group_id: &str) -> RepositoryResult<Vec<SharedPolicyGroup>> {
        self.availability.check("shared policy group history")?;
        Ok(self
            .snapshots
            .read()
            .iter()
            .filter(|s| s.id == group_id)
            .cloned()
            .collect())
    }

    fn delete_by_group(&self, group_id: &str) -> RepositoryResult<usize> {
        self.availability.check("shared policy group history")?;
        let mut snapshots = self.snapshots.write();
        let before = snapshots.len();
        snapshots.retain(|s| s.id != group_id);
        Ok(before - snapshots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatesync_protocol::{FlowPhase, LifecycleState};

    fn group(id: &str) -> SharedPolicyGroup {
        SharedPolicyGroup {
            id: id.into(),
            cross_id: format!("cross-{id}"),
            environment_id: "env-A".into(),
            organization_id: "org-1".into(),
            name: "group".into(),
            description: None,
            version: 0,
            lifecycle_state: LifecycleState::Undeployed,
            phase: FlowPhase::Request,
            steps: Vec::new(),
            deployed_at: None,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn update_requires_existing_record() {
        let repo = InMemorySharedPolicyGroupRepository::new();
        let err = repo.update(group("g1")).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));

        repo.create(group("g1")).unwrap();
        assert!(repo.create(group("g1")).is_err());
        let mut renamed = group("g1");
        renamed.name = "renamed".into();
        repo.update(renamed).unwrap();
        assert_eq!(repo.find_by_id("g1").unwrap().unwrap().name, "renamed");

        repo.delete("g1").unwrap();
        repo.delete("g1").unwrap();
        assert!(repo.is_empty());
    }

    #[test]
    fn latest_deployed_snapshot_ignores_undeploys() {
        let history = InMemorySharedPolicyGroupHistoryRepository::new();
        let first = group("g1").deploy(10);
        let second = first.undeploy(20);
        history.create(first.clone()).unwrap();
        history.create(second).unwrap();
        history.create(group("g2").deploy(30)).unwrap();

        let latest = history.find_latest_deployed("g1").unwrap().unwrap();
        assert_eq!(latest, first);
        assert!(history.find_latest_deployed("g3").unwrap().is_none());
        assert_eq!(history.find_by_group("g1").unwrap().len(), 2);

        assert_eq!(history.delete_by_group("g1").unwrap(), 2);
        assert!(history.find_by_group("g1").unwrap().is_empty());
        assert_eq!(history.find_by_group("g2").unwrap().len(), 1);
    }
}
