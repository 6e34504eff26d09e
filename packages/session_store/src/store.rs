use std::sync::Arc;

use observable::Reader;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::client::MessagingClient;
use crate::config::{ClientConfig, StoreConfig};
use crate::correlator::Correlator;
use crate::error::{LifecycleError, SessionError};
use crate::manager::ConnectionManager;
use crate::registry::MessageTypeRegistry;
use crate::session::{SessionDescriptor, SessionState};
use crate::state::ConnectionState;

/// Everything a UI needs from one messaging client: connection status and
/// session slots, per-type message slots, and awaitable requests.
///
/// Each store is independent; create one per client.
pub struct SessionStore {
    session: Arc<SessionState>,
    registry: Arc<MessageTypeRegistry>,
    correlator: Arc<Correlator>,
    manager: ConnectionManager,
}

impl SessionStore {
    pub fn new(client: Arc<dyn MessagingClient>) -> Self {
        Self::with_config(client, StoreConfig::default())
    }

    pub fn with_config(client: Arc<dyn MessagingClient>, config: StoreConfig) -> Self {
        let session = Arc::new(SessionState::new(config.update_capacity));
        let registry = Arc::new(MessageTypeRegistry::new(config.update_capacity));
        let correlator = Arc::new(Correlator::new(
            client.clone(),
            session.clone(),
            config.request_timeout,
        ));
        let manager = ConnectionManager::new(
            client,
            session.clone(),
            registry.clone(),
            correlator.clone(),
            config.error_capacity,
        );
        Self {
            session,
            registry,
            correlator,
            manager,
        }
    }

    pub async fn connect(&self, config: ClientConfig) -> Result<(), SessionError> {
        self.manager.connect(config).await
    }

    pub async fn disconnect(&self) {
        self.manager.disconnect().await
    }

    /// Send `{type, params}` and wait for the server's response.
    pub async fn send_message(
        &self,
        message_type: &str,
        params: Value,
    ) -> Result<Value, SessionError> {
        self.correlator.send_message(message_type, params).await
    }

    /// Call `callback` with every inbound message of `message_type`.
    /// Returns false if `connect` has not been called yet.
    pub async fn on<F>(&self, message_type: &str, callback: F) -> bool
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.manager.on(message_type, callback).await
    }

    pub fn get_session(&self) -> Option<SessionDescriptor> {
        self.manager.get_session()
    }

    pub fn connection_status(&self) -> Reader<bool> {
        self.session.connected()
    }

    pub fn session(&self) -> Reader<Option<SessionDescriptor>> {
        self.session.session()
    }

    pub fn connection_state(&self) -> Reader<ConnectionState> {
        self.session.state()
    }

    /// Every generic message, typed or not, as its raw envelope
    pub fn last_message(&self) -> Reader<Option<Value>> {
        self.session.last_message()
    }

    /// The slot holding the latest payload of `message_type`. Repeated calls
    /// return views of the same slot.
    pub async fn subscribe_to_message_type(&self, message_type: &str) -> Reader<Option<Value>> {
        self.registry.get_or_create_slot(message_type).await.reader()
    }

    pub fn lifecycle_errors(&self) -> broadcast::Receiver<LifecycleError> {
        self.manager.lifecycle_errors()
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }
}
