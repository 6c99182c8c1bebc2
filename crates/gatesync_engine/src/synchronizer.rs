//! Generic event log reconciliation.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use gatesync_protocol::{
    Event, EventCriteria, EventProperty, EventType, ProtocolResult, SyncWindow,
};
use gatesync_repository::EventRepository;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Decision derived from the type of an entity's latest event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// The entity is active and must be registered.
    Register,
    /// The entity was removed and must be unregistered.
    Unregister,
}

/// An entity to remove from a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnregisterTarget {
    /// Entity ID.
    pub id: String,
    /// Environments targeted by the removal event.
    pub environments: BTreeSet<String>,
}

/// Registry changes made while applying a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// Registrations that changed a registry. Stale or identical
    /// definitions are not counted.
    pub registered: usize,
    /// Number of unregister calls.
    pub unregistered: usize,
}

impl AppliedChanges {
    fn add(&mut self, other: AppliedChanges) {
        self.registered += other.registered;
        self.unregistered += other.unregistered;
    }
}

/// Capabilities of one entity kind.
///
/// The synchronizer drives the algorithm; a kind only says which events
/// matter, how to read their payload and how to apply the outcome.
pub trait SyncKind: Send + Sync {
    /// Runtime object produced from a register event.
    type Entity: Send;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Event property holding the entity ID.
    fn id_property(&self) -> EventProperty;

    /// Event types to query for a window.
    fn event_types(&self, window: &SyncWindow) -> Vec<EventType>;

    /// Maps an event type to a decision. `None` ignores the event.
    fn classify(&self, event_type: EventType) -> Option<SyncAction>;

    /// Returns false for platform-wide kinds that ignore environments.
    fn environment_scoped(&self) -> bool {
        true
    }

    /// Returns true if one entity ID lives independently in each
    /// environment, so the latest event is picked per environment set.
    fn group_by_environment(&self) -> bool {
        false
    }

    /// Decodes the payload of a register event.
    fn decode(&self, event: &Event) -> ProtocolResult<Self::Entity>;

    /// Enriches the decoded entities of a page. Errors abort the run.
    fn prepare(&self, entities: Vec<Self::Entity>) -> SyncResult<Vec<Self::Entity>> {
        Ok(entities)
    }

    /// Applies the registrations of a page.
    fn register(&self, entities: Vec<Self::Entity>) -> SyncResult<AppliedChanges>;

    /// Applies the unregistrations of a page.
    fn unregister(&self, targets: Vec<UnregisterTarget>) -> SyncResult<AppliedChanges>;
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Non-empty pages fetched.
    pub pages: usize,
    /// Events fetched.
    pub fetched: usize,
    /// Registrations that changed a registry.
    pub registered: usize,
    /// Unregister calls made.
    pub unregistered: usize,
    /// Events ignored because of their type or an already applied newer event.
    pub skipped: usize,
    /// Events whose payload could not be decoded.
    pub failed: usize,
    /// Wall time of the run.
    pub duration: Duration,
}

impl SyncReport {
    /// Returns true if the run touched a registry.
    pub fn has_changes(&self) -> bool {
        self.registered + self.unregistered > 0
    }
}

/// Accumulated statistics of a synchronizer.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Successful runs.
    pub runs: u64,
    /// Aborted runs.
    pub failed_runs: u64,
    /// Register calls over all runs.
    pub registered: u64,
    /// Unregister calls over all runs.
    pub unregistered: u64,
    /// Undecodable events over all runs.
    pub failed_events: u64,
    /// Report of the last successful run.
    pub last_report: Option<SyncReport>,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

/// Key under which decisions about one entity are tracked.
fn group_key(id: &str, event: &Event, by_environment: bool) -> String {
    if by_environment {
        let environments: Vec<&str> = event.environments.iter().map(String::as_str).collect();
        format!("{id}@{}", environments.join(","))
    } else {
        id.to_string()
    }
}

/// Latest event per entity within one page, in page order.
struct LatestEventIndex {
    order: Vec<String>,
    latest: HashMap<String, (String, Event)>,
}

impl LatestEventIndex {
    fn build(events: Vec<Event>, property: EventProperty, by_environment: bool) -> (Self, usize) {
        let mut index = Self {
            order: Vec::with_capacity(events.len()),
            latest: HashMap::with_capacity(events.len()),
        };
        let mut missing = 0;
        for event in events {
            let Some(id) = event.property(property).map(str::to_string) else {
                warn!(event_id = %event.id, property = %property, "event has no entity id, skipping");
                missing += 1;
                continue;
            };
            let key = group_key(&id, &event, by_environment);
            match index.latest.get(&key) {
                Some((_, current)) if current.created_at >= event.created_at => {}
                Some(_) => {
                    index.latest.insert(key, (id, event));
                }
                None => {
                    index.order.push(key.clone());
                    index.latest.insert(key, (id, event));
                }
            }
        }
        (index, missing)
    }

    /// Yields `(key, id, event)` in page order.
    fn into_entries(mut self) -> impl Iterator<Item = (String, String, Event)> {
        self.order.into_iter().filter_map(move |key| {
            let (id, event) = self.latest.remove(&key)?;
            Some((key, id, event))
        })
    }
}

/// Polls the event log for one entity kind and reconciles its registry.
pub struct Synchronizer<K: SyncKind> {
    kind: K,
    events: Arc<dyn EventRepository>,
    bulk_items: usize,
    timeframe_before_delay: Duration,
    timeframe_after_delay: Duration,
    stats: RwLock<SyncStats>,
}

impl<K: SyncKind> Synchronizer<K> {
    /// Creates a synchronizer reading `events`.
    pub fn new(kind: K, events: Arc<dyn EventRepository>, config: &SyncConfig) -> Self {
        Self {
            kind,
            events,
            bulk_items: config.bulk_items.max(1),
            timeframe_before_delay: config.timeframe_before_delay,
            timeframe_after_delay: config.timeframe_after_delay,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the entity kind.
    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Returns the accumulated statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Builds the event log query for a window.
    pub fn criteria(&self, window: SyncWindow, environments: &BTreeSet<String>) -> EventCriteria {
        let criteria = EventCriteria::new()
            .with_types(self.kind.event_types(&window))
            .with_window(window.padded(self.timeframe_before_delay, self.timeframe_after_delay))
            .with_strict_mode(true)
            .with_group_by_environment(self.kind.group_by_environment());
        if self.kind.environment_scoped() {
            criteria.with_environments(environments.iter().cloned())
        } else {
            criteria
        }
    }

    /// Reconciles the registry with the events of `[from, to)`.
    ///
    /// `from == -1` performs a full resync. Registry calls made for pages
    /// processed before a failure are kept.
    pub fn synchronize(
        &self,
        from: i64,
        to: i64,
        environments: &BTreeSet<String>,
    ) -> SyncResult<SyncReport> {
        let start = Instant::now();
        let result = self.run(SyncWindow::new(from, to), environments);

        let mut stats = self.stats.write();
        match result {
            Ok(mut report) => {
                report.duration = start.elapsed();
                stats.runs += 1;
                stats.registered += report.registered as u64;
                stats.unregistered += report.unregistered as u64;
                stats.failed_events += report.failed as u64;
                stats.last_report = Some(report.clone());
                if report.has_changes() {
                    info!(
                        kind = self.kind.name(),
                        registered = report.registered,
                        unregistered = report.unregistered,
                        duration_ms = report.duration.as_millis() as u64,
                        "synchronization done"
                    );
                } else {
                    debug!(kind = self.kind.name(), pages = report.pages, "nothing to synchronize");
                }
                Ok(report)
            }
            Err(e) => {
                warn!(kind = self.kind.name(), from, to, error = %e, "synchronization aborted");
                stats.failed_runs += 1;
                stats.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn run(&self, window: SyncWindow, environments: &BTreeSet<String>) -> SyncResult<SyncReport> {
        let criteria = self.criteria(window, environments);
        let property = self.kind.id_property();
        let mut report = SyncReport::default();
        let mut decided: HashMap<String, i64> = HashMap::new();
        let mut page = 0;

        loop {
            let events = self
                .events
                .search_latest(&criteria, property, page, self.bulk_items)?;
            let fetched = events.len();
            debug!(kind = self.kind.name(), page, fetched, "fetched event page");
            if fetched == 0 {
                break;
            }
            report.pages += 1;
            report.fetched += fetched;
            self.process_page(events, &mut decided, &mut report)?;
            if fetched < self.bulk_items {
                break;
            }
            page += 1;
        }
        Ok(report)
    }

    fn process_page(
        &self,
        events: Vec<Event>,
        decided: &mut HashMap<String, i64>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let (index, missing) = LatestEventIndex::build(
            events,
            self.kind.id_property(),
            self.kind.group_by_environment(),
        );
        report.skipped += missing;

        let mut to_register = Vec::new();
        let mut to_unregister = Vec::new();
        for (key, id, event) in index.into_entries() {
            if let Some(&applied_at) = decided.get(&key) {
                if event.created_at <= applied_at {
                    debug!(kind = self.kind.name(), entity_id = %id, "newer event already applied");
                    report.skipped += 1;
                    continue;
                }
            }
            match self.kind.classify(event.event_type) {
                Some(SyncAction::Register) => {
                    decided.insert(key, event.created_at);
                    to_register.push(event);
                }
                Some(SyncAction::Unregister) => {
                    decided.insert(key, event.created_at);
                    to_unregister.push(UnregisterTarget {
                        id,
                        environments: event.environments,
                    });
                }
                None => report.skipped += 1,
            }
        }

        let mut entities = Vec::with_capacity(to_register.len());
        for event in &to_register {
            match self.kind.decode(event) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!(
                        kind = self.kind.name(),
                        event_id = %event.id,
                        error = %e,
                        "unable to read event payload, skipping"
                    );
                    report.failed += 1;
                }
            }
        }

        let mut applied = AppliedChanges::default();
        if !entities.is_empty() {
            let entities = self.kind.prepare(entities)?;
            applied.add(self.kind.register(entities)?);
        }
        if !to_unregister.is_empty() {
            applied.add(self.kind.unregister(to_unregister)?);
        }
        report.registered += applied.registered;
        report.unregistered += applied.unregistered;
        Ok(())
    }
}
