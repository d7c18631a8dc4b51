use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::metadata::{MetaValue, Metadata};
use crate::error::ValidationError;

/// Kind of event. Also the default topic when publishing through a [`Bus`](crate::bus::Bus).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Something an operator or user did.
    Operate,
    /// Something that needs attention.
    Alert,
    /// Any other application-defined type.
    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Operate => "operate",
            EventType::Alert => "alert",
            EventType::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "operate" => EventType::Operate,
            "alert" => EventType::Alert,
            _ => EventType::Custom(s),
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        EventType::from(s.to_string())
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for EventType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EventType::from(s))
    }
}

/// Something that happened, in a transport-independent shape.
///
/// Built once and then only read; transports derive their own messages
/// from it without changing it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    source: String,
    /// Unix epoch milliseconds.
    time: i64,
    #[serde(with = "payload_serde")]
    payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    metadata: Metadata,
}

mod payload_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(payload).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(id: impl Into<String>, event_type: impl Into<EventType>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            source: String::new(),
            time: now_millis(),
            payload,
            metadata: Metadata::new(),
        }
    }

    /// Create an event with a bitcode-serialized payload.
    pub fn encode<T: Serialize>(
        id: impl Into<String>,
        event_type: impl Into<EventType>,
        payload: &T,
    ) -> Result<Self, bitcode::Error> {
        let bytes = bitcode::serialize(payload)?;
        Ok(Self::new(id, event_type, bytes))
    }

    /// Create an event with a JSON payload.
    pub fn json<T: Serialize>(
        id: impl Into<String>,
        event_type: impl Into<EventType>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Self::new(id, event_type, bytes))
    }

    /// Create an event with a string payload.
    pub fn with_string_payload(
        id: impl Into<String>,
        event_type: impl Into<EventType>,
        payload: impl Into<String>,
    ) -> Self {
        Self::new(id, event_type, payload.into().into_bytes())
    }

    /// Set the emitting component.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Override the timestamp (unix epoch milliseconds).
    pub fn with_time(mut self, millis: i64) -> Self {
        self.time = millis;
        self
    }

    /// Add a metadata entry, replacing an existing one with the same key.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Replace the whole metadata map.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    /// Decode the payload from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.payload)
    }

    /// Decode the payload from JSON.
    pub fn decode_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Check that every required field is present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::missing("id"));
        }
        if self.event_type.as_str().is_empty() {
            return Err(ValidationError::missing("type"));
        }
        if self.time <= 0 {
            return Err(ValidationError {
                field: "time",
                reason: "must be positive",
            });
        }
        if self.metadata.iter().any(|(key, _)| key.is_empty()) {
            return Err(ValidationError {
                field: "metadata",
                reason: "has an empty key",
            });
        }
        Ok(())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.event_type, self.id)?;
        if let Some(payload) = self.payload_str() {
            write!(f, " {payload}")?;
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_construction() {
        let event = Event::with_string_payload("evt-1", "OrderCreated", "{}");
        assert_eq!(event.id(), "evt-1");
        assert_eq!(event.event_type(), &EventType::Custom("OrderCreated".into()));
        assert_eq!(event.payload_str(), Some("{}"));
        assert!(event.time() > 0);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn well_known_types_parse() {
        assert_eq!(EventType::from("operate"), EventType::Operate);
        assert_eq!(EventType::from("alert"), EventType::Alert);
        assert_eq!("alert".parse::<EventType>().unwrap(), EventType::Alert);
        assert_eq!(EventType::Operate.to_string(), "operate");
    }

    #[test]
    fn missing_id_fails_validation() {
        let event = Event::with_string_payload("", EventType::Alert, "{}");
        assert_eq!(event.validate(), Err(ValidationError::missing("id")));
    }

    #[test]
    fn missing_type_fails_validation() {
        let event = Event::with_string_payload("evt-1", "", "{}");
        assert_eq!(event.validate(), Err(ValidationError::missing("type")));
    }

    #[test]
    fn zero_time_fails_validation() {
        let event = Event::with_string_payload("evt-1", EventType::Alert, "{}").with_time(0);
        assert!(matches!(event.validate(), Err(ValidationError { field: "time", .. })));
    }

    #[test]
    fn empty_metadata_key_fails_validation() {
        let event = Event::with_string_payload("evt-1", EventType::Alert, "{}").with_meta("", 1);
        assert!(matches!(event.validate(), Err(ValidationError { field: "metadata", .. })));
    }

    #[test]
    fn typed_payloads() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Login {
            user: String,
        }

        let login = Login { user: "ada".into() };
        let binary = Event::encode("evt-1", EventType::Operate, &login).unwrap();
        assert_eq!(binary.decode::<Login>().unwrap(), login);

        let json = Event::json("evt-2", EventType::Operate, &login).unwrap();
        assert_eq!(json.payload_str(), Some(r#"{"user":"ada"}"#));
        assert_eq!(json.decode_json::<Login>().unwrap(), login);
    }

    #[test]
    fn metadata_builder_replaces_same_key() {
        let event = Event::with_string_payload("evt-1", EventType::Alert, "{}")
            .with_meta("key", "a")
            .with_meta("key", "b");
        assert_eq!(event.metadata().len(), 1);
        assert_eq!(event.meta("key"), Some(&MetaValue::from("b")));
    }
}
