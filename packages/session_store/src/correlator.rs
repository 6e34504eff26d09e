//! Request/response correlation: turns the client's fire-and-event `send`
//! into one awaitable call per request, settled exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::client::{Envelope, MessagingClient, OutboundRequest, RequestId, is_truthy};
use crate::error::{SessionError, TransportError};
use crate::session::SessionState;

type Outcome = Result<Value, TransportError>;
type PendingMap = Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>;

pub struct Correlator {
    client: Arc<dyn MessagingClient>,
    session: Arc<SessionState>,
    pending: PendingMap,
    next_id: AtomicU64,
    timeout: Option<Duration>,
}

impl Correlator {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        session: Arc<SessionState>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            session,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    /// Send `{type, params}` and wait for the matching response.
    ///
    /// Resolves with the full response object. Rejects with `Protocol` when
    /// the response has a truthy top-level `error` field. Dropping the
    /// returned future abandons the request.
    pub async fn send_message(
        &self,
        message_type: &str,
        params: Value,
    ) -> Result<Value, SessionError> {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        let _pending = PendingGuard::register(&self.pending, id, tx);

        // Checked after registering: a disconnect clears the status before it
        // abandons pending entries, so this request either sees the cleared
        // status here or is abandoned.
        if !self.session.is_connected() || self.session.current().is_none() {
            warn!(message_type, "not connected, cannot send message");
            return Err(SessionError::NotConnected);
        }

        debug!(request_id = %id, message_type, "sending message");
        self.client
            .send(OutboundRequest {
                id,
                envelope: Envelope {
                    message_type: message_type.to_string(),
                    params,
                },
            })
            .map_err(|e| {
                warn!(request_id = %id, message_type, error = %e, "send failed");
                SessionError::Transport(e)
            })?;

        let received = match self.timeout {
            Some(after) => match tokio::time::timeout(after, rx).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(request_id = %id, message_type, ?after, "request timed out");
                    return Err(SessionError::Timeout {
                        message_type: message_type.to_string(),
                        after,
                    });
                }
            },
            None => rx.await,
        };

        let response = received.map_err(|_| TransportError::ChannelClosed)??;
        debug!(request_id = %id, message_type, "response received");
        classify(response)
    }

    /// Deliver the outcome for `id`. Returns false when nobody is waiting
    /// (late, duplicate, or unknown id).
    pub fn settle(&self, id: RequestId, outcome: Outcome) -> bool {
        let Some(tx) = lock(&self.pending).remove(&id) else {
            debug!(request_id = %id, "response for unknown request, dropping");
            return false;
        };
        // The receiver may have gone away between removal and send.
        tx.send(outcome).is_ok()
    }

    /// Fail every outstanding request with `ChannelClosed`.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<_> = lock(&self.pending).drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(TransportError::ChannelClosed));
        }
        if count > 0 {
            debug!(count, "abandoned pending requests");
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Canonical response envelope: a truthy top-level `error` marks failure.
fn classify(response: Value) -> Result<Value, SessionError> {
    if response.get("error").is_some_and(is_truthy) {
        return Err(SessionError::Protocol { response });
    }
    Ok(response)
}

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<Outcome>>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Removes the pending entry when the call finishes or is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: RequestId,
}

impl<'a> PendingGuard<'a> {
    fn register(pending: &'a PendingMap, id: RequestId, tx: oneshot::Sender<Outcome>) -> Self {
        lock(pending).insert(id, tx);
        Self { pending, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}
