//! Event log.

use crate::availability::Availability;
use crate::error::{RepositoryError, RepositoryResult};
use gatesync_protocol::{Event, EventCriteria, EventProperty};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Append-mostly log of lifecycle events.
pub trait EventRepository: Send + Sync {
    /// Returns the latest event per value of `group`, one page at a time.
    ///
    /// Results are ordered by `created_at` descending, ties broken by
    /// insertion order descending, so pages are stable for a fixed page
    /// size. A `size` of zero returns every result.
    ///
    /// In strict mode the latest event of each group is chosen among all
    /// events carrying the property and then filtered by `criteria`;
    /// otherwise the latest is chosen among matching events.
    ///
    /// With `criteria.group_by_environment` a group is the pair of the
    /// property value and the event's environment set.
    fn search_latest(
        &self,
        criteria: &EventCriteria,
        group: EventProperty,
        page: usize,
        size: usize,
    ) -> RepositoryResult<Vec<Event>>;

    /// Returns every event matching `criteria`, newest first.
    fn search(&self, criteria: &EventCriteria) -> RepositoryResult<Vec<Event>>;

    /// Appends a new event. Fails if the ID is already used.
    fn create(&self, event: Event) -> RepositoryResult<Event>;

    /// Replaces the event with the same ID, or appends it.
    fn create_or_patch(&self, event: Event) -> RepositoryResult<Event>;
}

#[derive(Debug, Clone)]
struct StoredEvent {
    sequence: u64,
    event: Event,
}

impl StoredEvent {
    fn order_key(&self) -> (i64, u64) {
        (self.event.created_at, self.sequence)
    }
}

/// An in-memory event log.
///
/// # Example
///
/// ```rust
/// use gatesync_protocol::{Event, EventCriteria, EventProperty, EventType};
/// use gatesync_repository::{EventRepository, InMemoryEventRepository};
///
/// let events = InMemoryEventRepository::new();
/// events.create(Event::new(EventType::PublishApi, 1).with_property(EventProperty::ApiId, "api-1")).unwrap();
/// events.create(Event::new(EventType::StopApi, 2).with_property(EventProperty::ApiId, "api-1")).unwrap();
///
/// let latest = events
///     .search_latest(&EventCriteria::new(), EventProperty::ApiId, 0, 10)
///     .unwrap();
/// assert_eq!(latest.len(), 1);
/// assert_eq!(latest[0].event_type, EventType::StopApi);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    events: RwLock<Vec<StoredEvent>>,
    next_sequence: AtomicU64,
    writes: AtomicUsize,
    search_latest_calls: AtomicUsize,
    search_calls: AtomicUsize,
    availability: Availability,
}

impl InMemoryEventRepository {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log holding the given events in insertion order.
    ///
    /// Seeding does not count as writes.
    #[must_use]
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let repository = Self::new();
        {
            let mut stored = repository.events.write();
            for event in events {
                stored.push(StoredEvent {
                    sequence: repository.next_sequence.fetch_add(1, Ordering::SeqCst),
                    event,
                });
            }
        }
        repository
    }

    /// Returns every event in insertion order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.read().iter().map(|s| s.event.clone()).collect()
    }

    /// Returns the number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Number of successful `create`/`create_or_patch` calls.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `search_latest` calls, failed ones included.
    #[must_use]
    pub fn search_latest_calls(&self) -> usize {
        self.search_latest_calls.load(Ordering::SeqCst)
    }

    /// Number of `search` calls, failed ones included.
    #[must_use]
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Makes every call fail with [`RepositoryError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.availability.set_unavailable(unavailable);
    }

    fn append(&self, event: Event) -> Event {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.events.write().push(StoredEvent {
            sequence,
            event: event.clone(),
        });
        self.writes.fetch_add(1, Ordering::SeqCst);
        event
    }
}

impl EventRepository for InMemoryEventRepository {
    fn search_latest(
        &self,
        criteria: &EventCriteria,
        group: EventProperty,
        page: usize,
        size: usize,
    ) -> RepositoryResult<Vec<Event>> {
        self.search_latest_calls.fetch_add(1, Ordering::SeqCst);
        self.availability.check("event")?;

        let events = self.events.read();
        let mut latest: HashMap<(&str, Option<&BTreeSet<String>>), &StoredEvent> = HashMap::new();
        for stored in events.iter() {
            let Some(value) = stored.event.properties.get(group.as_str()) else {
                continue;
            };
            if !criteria.strict_mode && !criteria.matches(&stored.event) {
                continue;
            }
            let environments = criteria
                .group_by_environment
                .then_some(&stored.event.environments);
            latest
                .entry((value.as_str(), environments))
                .and_modify(|current| {
                    if stored.order_key() > current.order_key() {
                        *current = stored;
                    }
                })
                .or_insert(stored);
        }

        let mut selected: Vec<&StoredEvent> = latest
            .into_values()
            .filter(|stored| !criteria.strict_mode || criteria.matches(&stored.event))
            .collect();
        selected.sort_by(|a, b| b.order_key().cmp(&a.order_key()));

        let page_iter = selected.into_iter().map(|s| s.event.clone());
        if size == 0 {
            return Ok(page_iter.collect());
        }
        Ok(page_iter.skip(page.saturating_mul(size)).take(size).collect())
    }

    fn search(&self, criteria: &EventCriteria) -> RepositoryResult<Vec<Event>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.availability.check("event")?;

        let events = self.events.read();
        let mut matching: Vec<&StoredEvent> =
            events.iter().filter(|s| criteria.matches(&s.event)).collect();
        matching.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
        Ok(matching.into_iter().map(|s| s.event.clone()).collect())
    }

    fn create(&self, event: Event) -> RepositoryResult<Event> {
        self.availability.check("event")?;
        if self.events.read().iter().any(|s| s.event.id == event.id) {
            return Err(RepositoryError::Conflict(format!(
                "event {} already exists",
                event.id
            )));
        }
        Ok(self.append(event))
    }

    fn create_or_patch(&self, event: Event) -> RepositoryResult<Event> {
        self.availability.check("event")?;
        {
            let mut events = self.events.write();
            if let Some(stored) = events.iter_mut().find(|s| s.event.id == event.id) {
                stored.event = event.clone();
                self.writes.fetch_add(1, Ordering::SeqCst);
                return Ok(event);
            }
        }
        Ok(self.append(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatesync_protocol::{EventType, SyncWindow};

    fn api_event(id: &str, api: &str, event_type: EventType, created_at: i64, env: &str) -> Event {
        Event::new(event_type, created_at)
            .with_id(id)
            .with_property(EventProperty::ApiId, api)
            .with_environment(env)
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn latest_per_group_ordered_newest_first() {
        let repo = InMemoryEventRepository::with_events([
            api_event("e1", "api-1", EventType::PublishApi, 10, "env-A"),
            api_event("e2", "api-2", EventType::PublishApi, 20, "env-A"),
            api_event("e3", "api-1", EventType::StopApi, 30, "env-A"),
            api_event("e4", "api-3", EventType::StartApi, 15, "env-A"),
        ]);

        let latest = repo
            .search_latest(&EventCriteria::new(), EventProperty::ApiId, 0, 0)
            .unwrap();
        assert_eq!(ids(&latest), ["e3", "e2", "e4"]);
    }

    #[test]
    fn ties_are_broken_by_insertion_order() {
        let repo = InMemoryEventRepository::with_events([
            api_event("e1", "api-1", EventType::PublishApi, 10, "env-A"),
            api_event("e2", "api-1", EventType::StopApi, 10, "env-A"),
        ]);

        let latest = repo
            .search_latest(&EventCriteria::new(), EventProperty::ApiId, 0, 10)
            .unwrap();
        assert_eq!(ids(&latest), ["e2"]);
    }

    #[test]
    fn pages_are_stable_for_a_fixed_size() {
        let repo = InMemoryEventRepository::with_events(
            (0..5).map(|i| api_event(&format!("e{i}"), &format!("api-{i}"), EventType::PublishApi, 100, "env-A")),
        );

        let mut paged = Vec::new();
        for page in 0..3 {
            paged.extend(
                repo.search_latest(&EventCriteria::new(), EventProperty::ApiId, page, 2)
                    .unwrap(),
            );
        }
        let all = repo
            .search_latest(&EventCriteria::new(), EventProperty::ApiId, 0, 0)
            .unwrap();
        assert_eq!(paged, all);
        assert_eq!(ids(&all), ["e4", "e3", "e2", "e1", "e0"]);
    }

    #[test]
    fn strict_mode_drops_groups_whose_latest_does_not_match() {
        let repo = InMemoryEventRepository::with_events([
            api_event("e1", "api-1", EventType::PublishApi, 10, "env-A"),
            api_event("e2", "api-1", EventType::StopApi, 20, "env-A"),
            api_event("e3", "api-2", EventType::PublishApi, 15, "env-A"),
        ]);
        let criteria = EventCriteria::new().with_types([EventType::PublishApi, EventType::StartApi]);

        let strict = repo
            .search_latest(&criteria.clone().with_strict_mode(true), EventProperty::ApiId, 0, 0)
            .unwrap();
        assert_eq!(ids(&strict), ["e3"]);

        let loose = repo
            .search_latest(&criteria, EventProperty::ApiId, 0, 0)
            .unwrap();
        assert_eq!(ids(&loose), ["e3", "e1"]);
    }

    #[test]
    fn strict_mode_applies_window_after_selecting_latest() {
        let repo = InMemoryEventRepository::with_events([
            api_event("e1", "api-1", EventType::PublishApi, 10, "env-A"),
            api_event("e2", "api-1", EventType::PublishApi, 500, "env-A"),
        ]);
        let criteria = EventCriteria::new()
            .with_window(SyncWindow::new(1, 100))
            .with_strict_mode(true);

        let latest = repo
            .search_latest(&criteria, EventProperty::ApiId, 0, 0)
            .unwrap();
        assert!(latest.is_empty());
    }

    #[test]
    fn environments_filter() {
        let repo = InMemoryEventRepository::with_events([
            api_event("e1", "api-1", EventType::PublishApi, 10, "env-A"),
            api_event("e2", "api-2", EventType::PublishApi, 20, "env-B"),
        ]);
        let criteria = EventCriteria::new().with_environments(["env-B"]).with_strict_mode(true);

        let latest = repo
            .search_latest(&criteria, EventProperty::ApiId, 0, 0)
            .unwrap();
        assert_eq!(ids(&latest), ["e2"]);
    }

    #[test]
    fn grouping_by_environment_keeps_one_latest_per_environment() {
        let repo = InMemoryEventRepository::with_events([
            api_event("e1", "api-1", EventType::PublishApi, 10, "env-A"),
            api_event("e2", "api-1", EventType::PublishApi, 20, "env-B"),
            api_event("e3", "api-1", EventType::StopApi, 30, "env-B"),
        ]);

        let merged = repo
            .search_latest(&EventCriteria::new(), EventProperty::ApiId, 0, 0)
            .unwrap();
        assert_eq!(ids(&merged), ["e3"]);

        let per_environment = repo
            .search_latest(
                &EventCriteria::new().with_group_by_environment(true).with_strict_mode(true),
                EventProperty::ApiId,
                0,
                0,
            )
            .unwrap();
        assert_eq!(ids(&per_environment), ["e3", "e1"]);
    }

    #[test]
    fn events_without_group_property_are_ignored() {
        let repo = InMemoryEventRepository::with_events([Event::new(EventType::PublishApi, 1)]);
        let latest = repo
            .search_latest(&EventCriteria::new(), EventProperty::ApiId, 0, 0)
            .unwrap();
        assert!(latest.is_empty());
    }

    #[test]
    fn search_returns_all_matching_events() {
        let repo = InMemoryEventRepository::with_events([
            api_event("e1", "api-1", EventType::DebugApi, 10, "env-A"),
            api_event("e2", "api-1", EventType::DebugApi, 20, "env-A"),
            api_event("e3", "api-1", EventType::PublishApi, 30, "env-A"),
        ]);
        let found = repo
            .search(&EventCriteria::new().with_types([EventType::DebugApi]))
            .unwrap();
        assert_eq!(ids(&found), ["e2", "e1"]);
        assert_eq!(repo.search_calls(), 1);
    }

    #[test]
    fn create_rejects_duplicate_ids() {
        let repo = InMemoryEventRepository::new();
        repo.create(api_event("e1", "api-1", EventType::PublishApi, 1, "env-A"))
            .unwrap();
        let err = repo
            .create(api_event("e1", "api-1", EventType::StopApi, 2, "env-A"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.writes(), 1);
    }

    #[test]
    fn create_or_patch_replaces_in_place() {
        let repo = InMemoryEventRepository::with_events([
            api_event("e1", "api-1", EventType::DebugApi, 10, "env-A"),
        ]);
        let patched = api_event("e1", "api-1", EventType::DebugApi, 10, "env-A")
            .with_property(EventProperty::ApiDebugStatus, "DEBUGGING");
        repo.create_or_patch(patched).unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.writes(), 1);
        assert_eq!(
            repo.events()[0].property(EventProperty::ApiDebugStatus),
            Some("DEBUGGING")
        );
    }

    #[test]
    fn unavailable_store_fails_every_call() {
        let repo = InMemoryEventRepository::new();
        repo.set_unavailable(true);
        let err = repo
            .search_latest(&EventCriteria::new(), EventProperty::ApiId, 0, 10)
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(repo.search_latest_calls(), 1);
        assert!(repo.create(Event::new(EventType::PublishApi, 1)).is_err());
    }
}
