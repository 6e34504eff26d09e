//! ConnectionManager: owns the client channel and applies its events.
//!
//! One pump task per channel reads `ClientEvent`s in delivery order and
//! updates the session slots, the message registry, `on()` listeners, and
//! the correlator. The manager guarantees at most one live channel.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{ClientEvent, EventReceiver, InboundMessage, MessagingClient};
use crate::config::ClientConfig;
use crate::correlator::Correlator;
use crate::error::{LifecycleError, SessionError};
use crate::registry::MessageTypeRegistry;
use crate::session::{SessionDescriptor, SessionState};
use crate::state::{ConnectionState, Effect, LifecycleEvent};

/// Callback registered through [`ConnectionManager::on`]. Receives the raw
/// message envelope.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// An open client channel and the task pumping its events.
struct Channel {
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl Channel {
    fn is_live(&self) -> bool {
        !self.pump.is_finished()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State shared between the manager and its pump task.
struct Shared {
    session: Arc<SessionState>,
    registry: Arc<MessageTypeRegistry>,
    correlator: Arc<Correlator>,
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    lifecycle_tx: broadcast::Sender<LifecycleError>,
}

pub struct ConnectionManager {
    client: Arc<dyn MessagingClient>,
    shared: Arc<Shared>,
    channel: Mutex<Option<Channel>>,
    // Set by the first successful `connect`; never cleared
    established: AtomicBool,
}

impl ConnectionManager {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        session: Arc<SessionState>,
        registry: Arc<MessageTypeRegistry>,
        correlator: Arc<Correlator>,
        error_capacity: usize,
    ) -> Self {
        let (lifecycle_tx, _) = broadcast::channel(error_capacity.max(1));
        Self {
            client,
            shared: Arc::new(Shared {
                session,
                registry,
                correlator,
                listeners: RwLock::new(HashMap::new()),
                lifecycle_tx,
            }),
            channel: Mutex::new(None),
            established: AtomicBool::new(false),
        }
    }

    /// Open a channel unless one is already live.
    ///
    /// Calling this while connected re-affirms the connected status without
    /// opening a second channel. A channel left behind by a dropped socket is
    /// closed and replaced.
    pub async fn connect(&self, config: ClientConfig) -> Result<(), SessionError> {
        let mut channel = self.channel.lock().await;
        let session = &self.shared.session;

        if let Some(existing) = channel.as_ref() {
            if existing.is_live() {
                if self.client.is_connected() {
                    info!(application = %config.application, "already connected");
                    session.reaffirm();
                    return Ok(());
                }

                let state = session.current_state();
                if state.is_active() {
                    debug!(%state, "channel already open, not opening another");
                    return Ok(());
                }
            }

            info!("replacing stale channel");
            channel.take();
            self.client.close();
        }

        info!(
            application = %config.application,
            url = %config.url,
            "connecting"
        );
        session.apply(LifecycleEvent::ConnectRequested);

        let events = match self.client.start(&config) {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "client failed to start");
                session.apply(LifecycleEvent::ConnectFailed);
                return Err(e.into());
            }
        };

        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump_events(events, cancel.clone(), self.shared.clone()));
        *channel = Some(Channel { cancel, pump });
        self.established.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Close the channel (if any) and drop to a disconnected view.
    ///
    /// Requests still waiting for a response fail with `ChannelClosed`.
    pub async fn disconnect(&self) {
        if let Some(channel) = self.channel.lock().await.take() {
            drop(channel);
            self.client.close();
            info!("disconnected");
        }
        self.shared.session.apply(LifecycleEvent::DisconnectRequested);
        self.shared.correlator.abandon_all();
    }

    /// Register `callback` for inbound messages of `message_type`.
    ///
    /// Returns false (and registers nothing) until `connect` has opened a
    /// channel once. Listeners outlive `disconnect` and later reconnects.
    pub async fn on<F>(&self, message_type: &str, callback: F) -> bool
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if !self.established.load(Ordering::SeqCst) {
            warn!(
                message_type,
                "cannot register listener, no channel yet; call connect() first"
            );
            return false;
        }

        debug!(message_type, "registering listener");
        self.shared
            .listeners
            .write()
            .await
            .entry(message_type.to_string())
            .or_default()
            .push(Arc::new(callback));
        true
    }

    pub fn get_session(&self) -> Option<SessionDescriptor> {
        self.shared.session.current()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.session.current_state()
    }

    /// True while a channel is open and its pump is running
    pub async fn has_channel(&self) -> bool {
        self.channel.lock().await.as_ref().is_some_and(Channel::is_live)
    }

    pub fn lifecycle_errors(&self) -> broadcast::Receiver<LifecycleError> {
        self.shared.lifecycle_tx.subscribe()
    }
}

async fn pump_events(mut events: EventReceiver, cancel: CancellationToken, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => {
                match event {
                    Some(event) => shared.handle(event).await,
                    None => {
                        // The client dropped its side without a disconnect event.
                        info!("client event channel closed");
                        shared.session.apply(LifecycleEvent::SocketDisconnected);
                        break;
                    }
                }
            }
        }
    }
    debug!("event pump stopped");
}

impl Shared {
    async fn handle(&self, event: ClientEvent) {
        match event {
            ClientEvent::Registered(identity) => {
                info!(application = %identity.application, "session registered");
                self.session.apply(LifecycleEvent::Registered(identity));
            }
            ClientEvent::Reregistered(identity) => {
                info!(application = %identity.application, "session re-registered");
                self.session.apply(LifecycleEvent::Reregistered(identity));
            }
            ClientEvent::SocketDisconnected => {
                info!("socket disconnected");
                self.session.apply(LifecycleEvent::SocketDisconnected);
            }
            ClientEvent::Error(message) => {
                error!(error = %message, "client error");
                if let Effect::Report(message) = self.session.apply(LifecycleEvent::Error(message))
                {
                    let _ = self.lifecycle_tx.send(LifecycleError { message });
                }
            }
            ClientEvent::Message(envelope) => self.route(envelope).await,
            ClientEvent::Response {
                request_id,
                outcome,
            } => {
                self.correlator.settle(request_id, outcome);
            }
        }
    }

    async fn route(&self, envelope: Value) {
        self.session.record_message(envelope.clone());

        let Some(message) = InboundMessage::from_envelope(&envelope) else {
            debug!("generic message without a type");
            return;
        };

        if let Some(slot) = self.registry.get(&message.message_type).await {
            slot.set(Some(message.payload));
        }

        let listeners = self
            .listeners
            .read()
            .await
            .get(&message.message_type)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&envelope))).is_err() {
                error!(message_type = %message.message_type, "message listener panicked");
            }
        }
    }
}
