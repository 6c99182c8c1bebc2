//! Event log query criteria.

use crate::event::{Event, EventProperty, EventType};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Time window covered by one synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    /// Lower bound in epoch milliseconds, or [`SyncWindow::INITIAL`].
    pub from: i64,
    /// Upper bound in epoch milliseconds.
    pub to: i64,
}

impl SyncWindow {
    /// Marker for a full resynchronization.
    pub const INITIAL: i64 = -1;

    /// Creates a window.
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// Creates a full-resync window ending at `to`.
    pub fn initial(to: i64) -> Self {
        Self::new(Self::INITIAL, to)
    }

    /// Returns true if this window is a full resync.
    pub fn is_initial(&self) -> bool {
        self.from == Self::INITIAL
    }

    /// Widens the window to tolerate clock skew between writers.
    ///
    /// An initial window gets no lower bound at all.
    pub fn padded(&self, before: Duration, after: Duration) -> SyncWindow {
        let before = before.as_millis() as i64;
        let after = after.as_millis() as i64;
        let from = if self.is_initial() {
            0
        } else {
            self.from.saturating_sub(before).max(0)
        };
        SyncWindow::new(from, self.to.saturating_add(after))
    }
}

/// Filter applied to event log searches.
///
/// Empty sets match everything. A bound `<= 0` is unbounded. `from` is
/// inclusive and `to` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCriteria {
    /// Accepted event types.
    pub types: BTreeSet<EventType>,
    /// Accepted environments; an event matches if it targets any of them.
    pub environments: BTreeSet<String>,
    /// Required property values.
    pub properties: BTreeMap<String, BTreeSet<String>>,
    /// Inclusive lower bound on `created_at`.
    pub from: i64,
    /// Exclusive upper bound on `created_at`.
    pub to: i64,
    /// Pick the latest event per group before applying the filter.
    pub strict_mode: bool,
    /// Group on the property value and the event's environment set.
    pub group_by_environment: bool,
}

impl EventCriteria {
    /// Creates criteria matching every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the event types.
    pub fn with_types(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        self.types.extend(types);
        self
    }

    /// Restricts the environments.
    pub fn with_environments<S: Into<String>>(
        mut self,
        environments: impl IntoIterator<Item = S>,
    ) -> Self {
        self.environments
            .extend(environments.into_iter().map(Into::into));
        self
    }

    /// Requires a property to hold one of the given values.
    pub fn with_property<S: Into<String>>(
        mut self,
        key: EventProperty,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.properties
            .entry(key.as_str().to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Sets both bounds from a window.
    pub fn with_window(mut self, window: SyncWindow) -> Self {
        self.from = window.from;
        self.to = window.to;
        self
    }

    /// Enables or disables strict latest-per-group selection.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Keeps one latest event per environment set instead of one per
    /// property value.
    pub fn with_group_by_environment(mut self, enabled: bool) -> Self {
        self.group_by_environment = enabled;
        self
    }

    /// Returns true if the event satisfies every filter.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.types.is_empty() && !self.types.contains(&event.event_type) {
            return false;
        }
        if !self.environments.is_empty()
            && event.environments.is_disjoint(&self.environments)
        {
            return false;
        }
        if self.from > 0 && event.created_at < self.from {
            return false;
        }
        if self.to > 0 && event.created_at >= self.to {
            return false;
        }
        self.properties.iter().all(|(key, values)| {
            event
                .properties
                .get(key)
                .is_some_and(|value| values.contains(value))
        })
    }
}
