//! Event log records.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Debug status of a DEBUG_API event waiting for a gateway.
pub const DEBUG_STATUS_TO_DEBUG: &str = "TO_DEBUG";

/// Debug status of a DEBUG_API event picked up by a gateway.
pub const DEBUG_STATUS_DEBUGGING: &str = "DEBUGGING";

/// Returns the current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Type of an event in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// An API definition was published.
    PublishApi,
    /// An API was unpublished.
    UnpublishApi,
    /// An API was started.
    StartApi,
    /// An API was stopped.
    StopApi,
    /// An API debug session was requested.
    DebugApi,
    /// A dictionary was published.
    PublishDictionary,
    /// A dictionary was unpublished.
    UnpublishDictionary,
    /// An organization was published.
    PublishOrganization,
    /// A shared policy group was deployed.
    DeploySharedPolicyGroup,
    /// A shared policy group was undeployed.
    UndeploySharedPolicyGroup,
}

impl EventType {
    /// All event types, in declaration order.
    pub const ALL: [EventType; 10] = [
        EventType::PublishApi,
        EventType::UnpublishApi,
        EventType::StartApi,
        EventType::StopApi,
        EventType::DebugApi,
        EventType::PublishDictionary,
        EventType::UnpublishDictionary,
        EventType::PublishOrganization,
        EventType::DeploySharedPolicyGroup,
        EventType::UndeploySharedPolicyGroup,
    ];

    /// Returns the wire name of this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PublishApi => "PUBLISH_API",
            EventType::UnpublishApi => "UNPUBLISH_API",
            EventType::StartApi => "START_API",
            EventType::StopApi => "STOP_API",
            EventType::DebugApi => "DEBUG_API",
            EventType::PublishDictionary => "PUBLISH_DICTIONARY",
            EventType::UnpublishDictionary => "UNPUBLISH_DICTIONARY",
            EventType::PublishOrganization => "PUBLISH_ORGANIZATION",
            EventType::DeploySharedPolicyGroup => "DEPLOY_SHARED_POLICY_GROUP",
            EventType::UndeploySharedPolicyGroup => "UNDEPLOY_SHARED_POLICY_GROUP",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProtocolError::UnknownEventType(s.to_string()))
    }
}

/// Well-known event property keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventProperty {
    /// Identifier of the API an event targets.
    ApiId,
    /// Identifier of the dictionary an event targets.
    DictionaryId,
    /// Identifier of the organization an event targets.
    OrganizationId,
    /// Cross identifier of the shared policy group an event targets.
    SharedPolicyGroupId,
    /// Processing status of a debug event.
    ApiDebugStatus,
}

impl EventProperty {
    /// Returns the property key as stored on events.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventProperty::ApiId => "api_id",
            EventProperty::DictionaryId => "dictionary_id",
            EventProperty::OrganizationId => "organization_id",
            EventProperty::SharedPolicyGroupId => "shared_policy_group_id",
            EventProperty::ApiDebugStatus => "api_debug_status",
        }
    }
}

impl fmt::Display for EventProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped record of a lifecycle change.
///
/// Events are immutable once stored, with the exception of the debug status
/// property which gateways patch when they pick up a debug request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event ID.
    pub id: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Serialized definition of the target entity, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Creation time in epoch milliseconds. This is the ordering key.
    pub created_at: i64,
    /// Free-form properties, keyed by [`EventProperty`] names.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Environments the event targets.
    #[serde(default)]
    pub environments: BTreeSet<String>,
}

impl Event {
    /// Creates a new event with a random ID.
    pub fn new(event_type: EventType, created_at: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            payload: None,
            created_at,
            properties: BTreeMap::new(),
            environments: BTreeSet::new(),
        }
    }

    /// Sets the event ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Sets a well-known property.
    pub fn with_property(mut self, key: EventProperty, value: impl Into<String>) -> Self {
        self.properties.insert(key.as_str().to_string(), value.into());
        self
    }

    /// Adds a target environment.
    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.environments.insert(environment_id.into());
        self
    }

    /// Returns the value of a well-known property.
    pub fn property(&self, key: EventProperty) -> Option<&str> {
        self.properties.get(key.as_str()).map(String::as_str)
    }

    /// Returns the value of a property that must be present.
    pub fn require_property(&self, key: EventProperty) -> ProtocolResult<&str> {
        self.property(key).ok_or_else(|| ProtocolError::MissingProperty {
            event_id: self.id.clone(),
            property: key.as_str(),
        })
    }
}
