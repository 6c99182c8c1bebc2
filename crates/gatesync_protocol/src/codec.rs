//! JSON payload encoding.

use crate::error::{ProtocolError, ProtocolResult};
use crate::event::Event;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes a definition into an event payload.
pub fn encode_payload<T: Serialize>(value: &T) -> ProtocolResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Deserializes the payload of an event.
pub fn decode_payload<T: DeserializeOwned>(event: &Event) -> ProtocolResult<T> {
    let payload = event
        .payload
        .as_deref()
        .ok_or_else(|| ProtocolError::MissingPayload(event.id.clone()))?;
    serde_json::from_str(payload).map_err(|source| ProtocolError::InvalidPayload {
        event_id: event.id.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DictionaryDefinition, EventType};

    #[test]
    fn decode_reports_event_id() {
        let event = Event::new(EventType::PublishDictionary, 1)
            .with_id("evt-9")
            .with_payload("{not json");
        let err = decode_payload::<DictionaryDefinition>(&event).unwrap_err();
        assert!(err.is_event_local());
        assert!(err.to_string().contains("evt-9"));
    }

    #[test]
    fn missing_payload() {
        let event = Event::new(EventType::PublishDictionary, 1).with_id("evt-1");
        let err = decode_payload::<DictionaryDefinition>(&event).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingPayload(id) if id == "evt-1"));
    }

    #[test]
    fn encoded_payload_decodes() {
        let dictionary = DictionaryDefinition::new("dict-1", "countries").with_entry("fr", "France");
        let event = Event::new(EventType::PublishDictionary, 1)
            .with_payload(encode_payload(&dictionary).unwrap());
        let decoded: DictionaryDefinition = decode_payload(&event).unwrap();
        assert_eq!(decoded, dictionary);
    }
}
