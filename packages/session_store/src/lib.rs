//! Session Store - observable session state over an opaque messaging client
//!
//! Wraps a real-time messaging client (anything implementing
//! [`MessagingClient`]) and exposes:
//!
//! - connection status, session descriptor, and lifecycle state as observable slots
//! - one observable slot per inbound message type, created on first request
//! - `send_message`, an awaitable request settled by the matching response
//!
//! The wrapped client keeps ownership of sockets, registration, tokens, and
//! retries. This crate only translates its events.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use session_store::{ClientConfig, MessagingClient, SessionStore};
//!
//! async fn run(client: Arc<dyn MessagingClient>) -> Result<(), session_store::SessionError> {
//!     let store = SessionStore::new(client);
//!
//!     let status = store.connection_status();
//!     let _sub = status.subscribe(|connected| println!("connected: {connected}"));
//!
//!     store.connect(ClientConfig::new("demo", "http://127.0.0.1:8080")).await?;
//!
//!     let mut connected = status.watch();
//!     let _ = connected.wait_for(|c| *c).await;
//!
//!     let response = store.send_message("ping", json!({})).await?;
//!     println!("{response}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod correlator;
mod error;
pub mod manager;
pub mod registry;
pub mod session;
pub mod state;
mod store;

#[cfg(test)]
mod test_helpers;

pub use client::{
    ClientEvent, Envelope, EventReceiver, EventSender, Identity, InboundMessage, MessagingClient,
    OutboundRequest, RequestId,
};
pub use config::{ClientConfig, StoreConfig, load_config, resolve};
pub use error::{LifecycleError, SessionError, TransportError};
pub use manager::ConnectionManager;
pub use observable::Reader;
pub use registry::MessageTypeRegistry;
pub use session::{SessionDescriptor, SessionState};
pub use state::ConnectionState;
pub use store::SessionStore;
