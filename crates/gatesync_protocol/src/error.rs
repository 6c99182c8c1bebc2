//! Error types for protocol encoding and parsing.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding, decoding or parsing protocol values.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// An event payload could not be decoded into its definition.
    #[error("invalid payload for event {event_id}: {source}")]
    InvalidPayload {
        /// Event ID.
        event_id: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An event carries no payload.
    #[error("event {0} has no payload")]
    MissingPayload(String),

    /// An event lacks a required property.
    #[error("event {event_id} has no {property} property")]
    MissingProperty {
        /// Event ID.
        event_id: String,
        /// Property key.
        property: &'static str,
    },

    /// A string does not name a known event type.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A value could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Returns true if this error concerns a single event's content.
    ///
    /// Such failures are isolated to the event and never abort a run.
    pub fn is_event_local(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidPayload { .. }
                | ProtocolError::MissingPayload(_)
                | ProtocolError::MissingProperty { .. }
        )
    }
}
