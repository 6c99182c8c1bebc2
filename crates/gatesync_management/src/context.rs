//! Stores and services shared by management use cases.

use crate::clock::{Clock, SystemClock};
use crate::publisher::EventPublisher;
use gatesync_repository::{
    EventLatestRepository, EventRepository, InMemoryEventLatestRepository,
    InMemoryEventRepository, InMemorySharedPolicyGroupHistoryRepository,
    InMemorySharedPolicyGroupRepository, SharedPolicyGroupHistoryRepository,
    SharedPolicyGroupRepository,
};
use std::sync::Arc;

/// Context for use case execution.
pub struct ManagementContext {
    /// Live shared policy group records.
    pub groups: Arc<dyn SharedPolicyGroupRepository>,
    /// Deployment history of shared policy groups.
    pub history: Arc<dyn SharedPolicyGroupHistoryRepository>,
    /// Event publication.
    pub publisher: EventPublisher,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl ManagementContext {
    /// Creates a context.
    pub fn new(
        groups: Arc<dyn SharedPolicyGroupRepository>,
        history: Arc<dyn SharedPolicyGroupHistoryRepository>,
        events: Arc<dyn EventRepository>,
        latest: Arc<dyn EventLatestRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            groups,
            history,
            publisher: EventPublisher::new(events, latest, clock.clone()),
            clock,
        }
    }

    /// Creates a context over fresh in-memory stores and the system clock.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemorySharedPolicyGroupRepository::new()),
            Arc::new(InMemorySharedPolicyGroupHistoryRepository::new()),
            Arc::new(InMemoryEventRepository::new()),
            Arc::new(InMemoryEventLatestRepository::new()),
            Arc::new(SystemClock),
        )
    }

    /// Returns the current time.
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }
}
