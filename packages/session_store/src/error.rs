//! Error types for sends and client lifecycle reporting.

use std::time::Duration;

use serde_json::Value;

/// Failures reported by (or while talking to) the underlying client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("client failed to start: {0}")]
    StartFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("client event channel closed")]
    ChannelClosed,
}

/// Errors returned to callers of the session store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// No registered session; nothing was transmitted.
    #[error("not connected")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered, but the response carries an `error` marker.
    #[error("server returned an error: {}", error_text(.response))]
    Protocol { response: Value },

    #[error("no response to '{message_type}' within {after:?}")]
    Timeout {
        message_type: String,
        after: Duration,
    },
}

impl SessionError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::NotConnected => "not_connected",
            Self::Transport(_) => "transport_error",
            Self::Protocol { .. } => "protocol_error",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// The rejected response object, for protocol errors.
    pub fn response(&self) -> Option<&Value> {
        match self {
            Self::Protocol { response } => Some(response),
            _ => None,
        }
    }
}

/// A client error event not tied to any pending request.
///
/// Never returned from a call; published to `lifecycle_errors()` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("client error: {message}")]
pub struct LifecycleError {
    pub message: String,
}

fn error_text(response: &Value) -> String {
    match response.get("error") {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => response.to_string(),
    }
}
