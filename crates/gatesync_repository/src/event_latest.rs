//! Latest-event index written by the management plane.

use crate::availability::Availability;
use crate::error::RepositoryResult;
use gatesync_protocol::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Keeps the most recent event per managed entity.
pub trait EventLatestRepository: Send + Sync {
    /// Stores `event` as the latest event for `key`, replacing any previous one.
    fn create_or_patch(
        &self,
        organization_id: &str,
        key: &str,
        event: Event,
    ) -> RepositoryResult<Event>;
}

#[derive(Debug, Clone)]
struct LatestEntry {
    organization_id: String,
    event: Event,
}

/// An in-memory latest-event index.
#[derive(Debug, Default)]
pub struct InMemoryEventLatestRepository {
    entries: RwLock<HashMap<String, LatestEntry>>,
    writes: AtomicUsize,
    availability: Availability,
}

impl InMemoryEventLatestRepository {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest event stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Event> {
        self.entries.read().get(key).map(|e| e.event.clone())
    }

    /// Returns the organization the entry under `key` belongs to.
    #[must_use]
    pub fn organization_of(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .get(key)
            .map(|e| e.organization_id.clone())
    }

    /// Number of successful writes.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every call fail with an unavailable error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.availability.set_unavailable(unavailable);
    }
}

impl EventLatestRepository for InMemoryEventLatestRepository {
    fn create_or_patch(
        &self,
        organization_id: &str,
        key: &str,
        event: Event,
    ) -> RepositoryResult<Event> {
        self.availability.check("latest event")?;
        let mut latest = event.clone();
        latest.id = key.to_string();
        self.entries.write().insert(
            key.to_string(),
            LatestEntry {
                organization_id: organization_id.to_string(),
                event: latest.clone(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(latest)
    }
}
