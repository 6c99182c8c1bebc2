//! Inspect command implementation.

use super::EntityKind;
use gatesync_protocol::{EventCriteria, EventProperty, EventType};
use gatesync_repository::{EventRepository, Snapshot};
use serde::Serialize;
use std::path::Path;

/// Latest event of one entity.
#[derive(Debug, Serialize)]
pub struct LatestEvent {
    /// Entity ID.
    pub entity_id: String,
    /// Event type.
    pub event_type: EventType,
    /// Event time in epoch milliseconds.
    pub created_at: i64,
    /// Targeted environments.
    pub environments: Vec<String>,
}

impl EntityKind {
    fn property(self) -> EventProperty {
        match self {
            EntityKind::Api => EventProperty::ApiId,
            EntityKind::Dictionary => EventProperty::DictionaryId,
            EntityKind::Organization => EventProperty::OrganizationId,
            EntityKind::SharedPolicyGroup => EventProperty::SharedPolicyGroupId,
        }
    }

    fn event_types(self) -> Vec<EventType> {
        match self {
            EntityKind::Api => vec![
                EventType::PublishApi,
                EventType::UnpublishApi,
                EventType::StartApi,
                EventType::StopApi,
            ],
            EntityKind::Dictionary => {
                vec![EventType::PublishDictionary, EventType::UnpublishDictionary]
            }
            EntityKind::Organization => vec![EventType::PublishOrganization],
            EntityKind::SharedPolicyGroup => vec![
                EventType::DeploySharedPolicyGroup,
                EventType::UndeploySharedPolicyGroup,
            ],
        }
    }
}

/// Runs the inspect command.
pub fn run(snapshot: &Path, kind: EntityKind, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let latest = latest_events(&Snapshot::load(snapshot)?, kind)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&latest)?);
        }
        _ => {
            println!("{} entities", latest.len());
            for event in &latest {
                println!(
                    "  {:<40} {:<30} {:>15} {}",
                    event.entity_id,
                    event.event_type,
                    event.created_at,
                    event.environments.join(",")
                );
            }
        }
    }
    Ok(())
}

/// Returns the latest event of every entity of `kind`, newest first.
pub fn latest_events(
    snapshot: &Snapshot,
    kind: EntityKind,
) -> Result<Vec<LatestEvent>, Box<dyn std::error::Error>> {
    let repositories = snapshot.clone().into_repositories();
    let criteria = EventCriteria::new()
        .with_types(kind.event_types())
        .with_strict_mode(true)
        .with_group_by_environment(kind == EntityKind::SharedPolicyGroup);
    let property = kind.property();

    Ok(repositories
        .events
        .search_latest(&criteria, property, 0, 0)?
        .into_iter()
        .map(|event| LatestEvent {
            entity_id: event.property(property).unwrap_or_default().to_string(),
            event_type: event.event_type,
            created_at: event.created_at,
            environments: event.environments.into_iter().collect(),
        })
        .collect())
}
