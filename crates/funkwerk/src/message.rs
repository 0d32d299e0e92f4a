use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload content type carried by every envelope. The bus contract fixes
/// the wire format to JSON.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Wire-format message envelope for inter-service communication.
///
/// Envelopes and payloads are serialized as JSON. The `topic` field is used
/// by PUB/SUB routing, while `correlation_id` enables request-result
/// tracking across queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Routing topic or queue name (e.g. "vigil.sd-instance.set").
    pub topic: String,

    /// JSON-encoded payload.
    pub payload: serde_json::Value,

    /// MIME type of the payload. Always `application/json` for now; kept on
    /// the wire so consumers can reject foreign formats.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// When this message was created.
    pub timestamp: DateTime<Utc>,

    /// Correlation ID for request-result tracking and tracing.
    pub correlation_id: Uuid,

    /// Schema version for forward-compatible evolution.
    /// Consumers should check this before deserializing the payload.
    #[serde(default = "default_version")]
    pub version: u16,
}

fn default_content_type() -> String {
    CONTENT_TYPE_JSON.to_string()
}

/// Default version for messages that omit the field (backward compat).
fn default_version() -> u16 {
    1
}

impl Message {
    /// Create a new message, serializing the payload as JSON.
    pub fn new<T: Serialize>(
        topic: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic: topic.into(),
            payload: serde_json::to_value(payload)?,
            content_type: default_content_type(),
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            version: 1,
        })
    }

    /// Create a message with an explicit correlation ID (for results that
    /// answer a specific request).
    pub fn with_correlation<T: Serialize>(
        topic: impl Into<String>,
        payload: &T,
        correlation_id: Uuid,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic: topic.into(),
            payload: serde_json::to_value(payload)?,
            content_type: default_content_type(),
            timestamp: Utc::now(),
            correlation_id,
            version: 1,
        })
    }

    /// Deserialize the payload into the expected type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Serialize this entire message envelope to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize a message envelope from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_message() {
        let payload = "hello world".to_string();
        let msg = Message::new("test.topic", &payload).unwrap();

        assert_eq!(msg.topic, "test.topic");
        assert_eq!(msg.content_type, CONTENT_TYPE_JSON);
        assert_eq!(msg.decode::<String>().unwrap(), "hello world");
    }

    #[test]
    fn roundtrip_envelope_bytes() {
        let msg = Message::new("events.instance", &42u64).unwrap();
        let bytes = msg.to_bytes().unwrap();
        let decoded = Message::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.topic, "events.instance");
        assert_eq!(decoded.correlation_id, msg.correlation_id);
        assert_eq!(decoded.decode::<u64>().unwrap(), 42);
    }

    #[test]
    fn with_correlation_preserves_id() {
        let id = Uuid::new_v4();
        let msg = Message::with_correlation("result", &true, id).unwrap();
        assert_eq!(msg.correlation_id, id);
    }

    #[test]
    fn missing_envelope_fields_default() {
        // Envelopes from older peers may omit content_type and version.
        let raw = serde_json::json!({
            "topic": "t",
            "payload": {"x": 1},
            "timestamp": Utc::now(),
            "correlation_id": Uuid::new_v4(),
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.content_type, CONTENT_TYPE_JSON);
        assert_eq!(msg.version, 1);
    }
}
