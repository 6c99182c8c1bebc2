//! Property-based test generators using proptest.
//!
//! Histories are generated with distinct timestamps so the latest event of
//! every entity is unambiguous, then shuffled so insertion order tells
//! nothing about time.

use crate::fixtures::{api, api_event};
use gatesync_protocol::{Event, EventType};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// One lifecycle change of a generated API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiChange {
    /// Index of the API; its ID is `api-{index}`.
    pub api: usize,
    /// START_API when true, STOP_API otherwise.
    pub started: bool,
    /// Event time, unique within a history.
    pub created_at: i64,
}

impl ApiChange {
    /// Returns the ID of the changed API.
    pub fn api_id(&self) -> String {
        format!("api-{}", self.api)
    }

    /// Builds the event of this change.
    pub fn to_event(&self) -> Event {
        let event_type = if self.started {
            EventType::StartApi
        } else {
            EventType::StopApi
        };
        let definition = api(&self.api_id()).with_deployed_at(self.created_at);
        api_event(&definition, event_type, self.created_at)
    }
}

/// Strategy for generating API histories over at most `apis` APIs.
pub fn api_history_strategy(
    apis: usize,
    max_changes: usize,
) -> impl Strategy<Value = Vec<ApiChange>> {
    prop::collection::vec((0..apis.max(1), any::<bool>()), 1..=max_changes.max(1))
        .prop_map(|changes| {
            changes
                .into_iter()
                .enumerate()
                .map(|(position, (api, started))| ApiChange {
                    api,
                    started,
                    created_at: 1_000 + position as i64 * 10,
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

/// Strategy for generating page sizes.
pub fn bulk_items_strategy() -> impl Strategy<Value = usize> {
    1usize..=8
}

/// Strategy for generating sharding tag names.
pub fn tag_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex")
}

/// Builds the events of a history in its (shuffled) order.
pub fn history_events(changes: &[ApiChange]) -> Vec<Event> {
    changes.iter().map(ApiChange::to_event).collect()
}

/// Returns the APIs whose latest change is a start.
pub fn expected_started(changes: &[ApiChange]) -> BTreeSet<String> {
    let mut latest: BTreeMap<usize, &ApiChange> = BTreeMap::new();
    for change in changes {
        latest
            .entry(change.api)
            .and_modify(|current| {
                if change.created_at > current.created_at {
                    *current = change;
                }
            })
            .or_insert(change);
    }
    latest
        .values()
        .filter(|change| change.started)
        .map(|change| change.api_id())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn histories_have_unique_timestamps(changes in api_history_strategy(5, 30)) {
            let times: BTreeSet<i64> = changes.iter().map(|c| c.created_at).collect();
            prop_assert_eq!(times.len(), changes.len());
        }
    }

    #[test]
    fn expected_started_follows_the_latest_change() {
        let changes = [
            ApiChange { api: 0, started: true, created_at: 30 },
            ApiChange { api: 0, started: false, created_at: 20 },
            ApiChange { api: 1, started: true, created_at: 10 },
            ApiChange { api: 1, started: false, created_at: 40 },
        ];
        assert_eq!(expected_started(&changes), BTreeSet::from(["api-0".to_string()]));
    }
}
