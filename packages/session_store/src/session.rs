//! Session state holder: connection status, session descriptor, lifecycle
//! state, and the last generic message, each in its own observable slot.

use std::sync::Mutex;

use observable::{Reader, Slot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Identity;
use crate::state::{ConnectionState, Effect, LifecycleEvent};

/// An authenticated session. Replaced wholesale on every lifecycle
/// transition, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub application: String,
    pub jwt: String,
}

impl From<Identity> for SessionDescriptor {
    fn from(identity: Identity) -> Self {
        Self {
            application: identity.application,
            jwt: identity.token,
        }
    }
}

pub struct SessionState {
    connected: Slot<bool>,
    session: Slot<Option<SessionDescriptor>>,
    state: Slot<ConnectionState>,
    last_message: Slot<Option<Value>>,
    // Serializes read-modify-write of `state`
    transition: Mutex<()>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(observable::DEFAULT_UPDATE_CAPACITY)
    }
}

impl SessionState {
    pub fn new(update_capacity: usize) -> Self {
        Self {
            connected: Slot::with_capacity(false, update_capacity),
            session: Slot::with_capacity(None, update_capacity),
            state: Slot::with_capacity(ConnectionState::Disconnected, update_capacity),
            last_message: Slot::with_capacity(None, update_capacity),
            transition: Mutex::new(()),
        }
    }

    pub fn connected(&self) -> Reader<bool> {
        self.connected.reader()
    }

    pub fn session(&self) -> Reader<Option<SessionDescriptor>> {
        self.session.reader()
    }

    pub fn state(&self) -> Reader<ConnectionState> {
        self.state.reader()
    }

    pub fn last_message(&self) -> Reader<Option<Value>> {
        self.last_message.reader()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn current(&self) -> Option<SessionDescriptor> {
        self.session.get()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Run one lifecycle event through the state machine and apply its effect.
    /// Returns the effect so the caller can act on reports.
    pub(crate) fn apply(&self, event: LifecycleEvent) -> Effect {
        let _guard = self.transition.lock().unwrap_or_else(|e| e.into_inner());

        let from = self.state.get();
        let transition = from.apply(event);
        if transition.state != from {
            self.state.set(transition.state);
        }

        match &transition.effect {
            Effect::Establish(descriptor) => {
                self.connected.set(true);
                self.session.set(Some(descriptor.clone()));
            }
            Effect::Clear => {
                self.connected.set(false);
                self.session.set(None);
            }
            Effect::None | Effect::Report(_) => {}
        }

        transition.effect
    }

    /// Re-assert `connected = true` for a live session without touching the
    /// descriptor. No-op when there is no session.
    pub(crate) fn reaffirm(&self) -> bool {
        let _guard = self.transition.lock().unwrap_or_else(|e| e.into_inner());
        if self.session.get().is_none() {
            return false;
        }
        self.connected.set(true);
        true
    }

    pub(crate) fn record_message(&self, envelope: Value) {
        self.last_message.set(Some(envelope));
    }
}
