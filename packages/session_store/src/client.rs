//! Boundary to the wrapped messaging client.
//!
//! The client owns the socket, registration, token handling, and any retry
//! logic. It reports everything that happens to it as [`ClientEvent`]s on a
//! single ordered channel returned from [`MessagingClient::start`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::error::TransportError;

/// Correlation id attached to each outbound request
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Who the client registered as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub application: String,
    pub token: String,
}

/// The `{type, params}` body of an outbound message. The client attaches
/// the session token itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub id: RequestId,
    pub envelope: Envelope,
}

/// Everything the client reports, in delivery order.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Session registered with the server
    Registered(Identity),
    /// Session restored after a transient reconnect
    Reregistered(Identity),
    /// The socket dropped
    SocketDisconnected,
    /// An error not tied to any request
    Error(String),
    /// A server-initiated message; the raw envelope bearing a `type` field
    Message(Value),
    /// The answer to an earlier [`MessagingClient::send`]
    Response {
        request_id: RequestId,
        outcome: Result<Value, TransportError>,
    },
}

pub type EventSender = mpsc::UnboundedSender<ClientEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

/// An opaque real-time messaging client.
pub trait MessagingClient: Send + Sync + 'static {
    /// Open a channel to the server. Lifecycle, message, and response events
    /// for this channel arrive on the returned receiver.
    fn start(&self, config: &ClientConfig) -> Result<EventReceiver, TransportError>;

    /// Transmit a request. The answer arrives later as
    /// [`ClientEvent::Response`] carrying the same id.
    fn send(&self, request: OutboundRequest) -> Result<(), TransportError>;

    /// The client's own view of whether its socket is up
    fn is_connected(&self) -> bool;

    /// Close the channel opened by `start`
    fn close(&self);
}

/// A generic inbound message split into its type and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub message_type: String,
    pub payload: Value,
}

impl InboundMessage {
    /// Returns `None` when the envelope has no string `type`. The payload is
    /// the envelope's `message` field when truthy, otherwise the envelope.
    pub fn from_envelope(envelope: &Value) -> Option<Self> {
        let message_type = envelope.get("type")?.as_str()?.to_string();
        let payload = match envelope.get("message") {
            Some(inner) if is_truthy(inner) => inner.clone(),
            _ => envelope.clone(),
        };
        Some(Self {
            message_type,
            payload,
        })
    }
}

/// JavaScript truthiness, which the server's envelopes are written against.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serializes_type_key() {
        let envelope = Envelope {
            message_type: "ping".into(),
            params: json!({}),
        };
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"type": "ping", "params": {}})
        );
    }

    #[test]
    fn request_id_display() {
        assert_eq!(RequestId(12).to_string(), "req-12");
    }

    #[test]
    fn inbound_message_uses_nested_payload() {
        let msg = InboundMessage::from_envelope(&json!({"type": "foo", "message": {"x": 1}}))
            .unwrap();
        assert_eq!(msg.message_type, "foo");
        assert_eq!(msg.payload, json!({"x": 1}));
    }

    #[test]
    fn inbound_message_falls_back_to_envelope() {
        let envelope = json!({"type": "foo", "value": 3});
        let msg = InboundMessage::from_envelope(&envelope).unwrap();
        assert_eq!(msg.payload, envelope);

        let envelope = json!({"type": "foo", "message": ""});
        let msg = InboundMessage::from_envelope(&envelope).unwrap();
        assert_eq!(msg.payload, envelope);
    }

    #[test]
    fn inbound_message_requires_string_type() {
        assert!(InboundMessage::from_envelope(&json!({"message": 1})).is_none());
        assert!(InboundMessage::from_envelope(&json!({"type": 5})).is_none());
        assert!(InboundMessage::from_envelope(&json!("bare")).is_none());
    }

    #[test]
    fn truthiness() {
        for v in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&v), "{v} should be falsy");
        }
        for v in [json!(true), json!(1), json!(-2.5), json!("x"), json!([]), json!({})] {
            assert!(is_truthy(&v), "{v} should be truthy");
        }
    }
}
