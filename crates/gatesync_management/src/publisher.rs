//! Event publication into the log read by gateways.

use crate::clock::Clock;
use crate::error::ManagementResult;
use gatesync_protocol::{Event, EventProperty, EventType};
use gatesync_repository::{EventLatestRepository, EventRepository};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Writes events for gateways to pick up.
pub struct EventPublisher {
    events: Arc<dyn EventRepository>,
    latest: Arc<dyn EventLatestRepository>,
    clock: Arc<dyn Clock>,
}

impl EventPublisher {
    /// Creates a publisher.
    pub fn new(
        events: Arc<dyn EventRepository>,
        latest: Arc<dyn EventLatestRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            latest,
            clock,
        }
    }

    /// Appends an event stamped with the current time.
    ///
    /// The event targets `environments`, or `environment_id` alone when the
    /// set is empty.
    pub fn create_event(
        &self,
        organization_id: &str,
        environment_id: &str,
        environments: BTreeSet<String>,
        event_type: EventType,
        payload: String,
        properties: impl IntoIterator<Item = (EventProperty, String)>,
    ) -> ManagementResult<Event> {
        let mut event = Event::new(event_type, self.clock.now_millis()).with_payload(payload);
        for (key, value) in properties {
            event = event.with_property(key, value);
        }
        event.environments = if environments.is_empty() {
            BTreeSet::from([environment_id.to_string()])
        } else {
            environments
        };

        let event = self.events.create(event)?;
        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            organization_id,
            "event published"
        );
        Ok(event)
    }

    /// Records `event` as the latest event of the entity identified by `key`.
    pub fn create_or_patch_latest_event(
        &self,
        organization_id: &str,
        key: &str,
        event: Event,
    ) -> ManagementResult<Event> {
        Ok(self.latest.create_or_patch(organization_id, key, event)?)
    }
}
