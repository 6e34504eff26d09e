//! Connection lifecycle state machine: states, transitions, and their effects
//! on the session slots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::Identity;
use crate::session::SessionDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// disconnected → connecting (caller invoked `connect`)
    ConnectRequested,
    /// connecting → disconnected (client refused to start)
    ConnectFailed,
    /// any → connected
    Registered(Identity),
    /// any → connected, session refreshed
    Reregistered(Identity),
    /// any → disconnected
    SocketDisconnected,
    /// any → disconnected (caller invoked `disconnect`)
    DisconnectRequested,
    /// no state change
    Error(String),
}

/// What the holder must do to its slots after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// status = true, session = descriptor
    Establish(SessionDescriptor),
    /// status = false, session = None
    Clear,
    /// surface to lifecycle error observers
    Report(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ConnectionState,
    pub effect: Effect,
}

impl ConnectionState {
    pub fn apply(self, event: LifecycleEvent) -> Transition {
        use ConnectionState::*;
        use LifecycleEvent::*;

        match (self, event) {
            (Disconnected, ConnectRequested) => Transition {
                state: Connecting,
                effect: Effect::None,
            },
            // Already connecting or connected: nothing to do here, the
            // manager decides whether a channel exists.
            (state, ConnectRequested) => Transition {
                state,
                effect: Effect::None,
            },
            (Connecting, ConnectFailed) => Transition {
                state: Disconnected,
                effect: Effect::Clear,
            },
            (state, ConnectFailed) => Transition {
                state,
                effect: Effect::None,
            },
            (_, Registered(identity)) | (_, Reregistered(identity)) => Transition {
                state: Connected,
                effect: Effect::Establish(identity.into()),
            },
            (_, SocketDisconnected) | (_, DisconnectRequested) => Transition {
                state: Disconnected,
                effect: Effect::Clear,
            },
            (state, Error(message)) => Transition {
                state,
                effect: Effect::Report(message),
            },
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(token: &str) -> Identity {
        Identity {
            application: "demo".into(),
            token: token.into(),
        }
    }

    #[test]
    fn connect_starts_connecting() {
        let t = ConnectionState::Disconnected.apply(LifecycleEvent::ConnectRequested);
        assert_eq!(t.state, ConnectionState::Connecting);
        assert_eq!(t.effect, Effect::None);
    }

    #[test]
    fn connect_while_connected_keeps_state() {
        let t = ConnectionState::Connected.apply(LifecycleEvent::ConnectRequested);
        assert_eq!(t.state, ConnectionState::Connected);
        assert_eq!(t.effect, Effect::None);
    }

    #[test]
    fn registered_establishes_session() {
        let t = ConnectionState::Connecting.apply(LifecycleEvent::Registered(identity("t1")));
        assert_eq!(t.state, ConnectionState::Connected);
        assert_eq!(
            t.effect,
            Effect::Establish(SessionDescriptor {
                application: "demo".into(),
                jwt: "t1".into(),
            })
        );
    }

    #[test]
    fn reregistered_refreshes_session() {
        let t = ConnectionState::Connected.apply(LifecycleEvent::Reregistered(identity("t2")));
        assert_eq!(t.state, ConnectionState::Connected);
        assert!(matches!(t.effect, Effect::Establish(ref d) if d.jwt == "t2"));
    }

    #[test]
    fn disconnect_clears_from_any_state() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ] {
            for event in [
                LifecycleEvent::SocketDisconnected,
                LifecycleEvent::DisconnectRequested,
            ] {
                let t = state.apply(event);
                assert_eq!(t.state, ConnectionState::Disconnected);
                assert_eq!(t.effect, Effect::Clear);
            }
        }
    }

    #[test]
    fn error_does_not_move_state() {
        let t = ConnectionState::Connected.apply(LifecycleEvent::Error("boom".into()));
        assert_eq!(t.state, ConnectionState::Connected);
        assert_eq!(t.effect, Effect::Report("boom".into()));
    }

    #[test]
    fn connect_failed_rolls_back() {
        let t = ConnectionState::Connecting.apply(LifecycleEvent::ConnectFailed);
        assert_eq!(t.state, ConnectionState::Disconnected);

        // A late failure must not tear down a registered session
        let t = ConnectionState::Connected.apply(LifecycleEvent::ConnectFailed);
        assert_eq!(t.state, ConnectionState::Connected);
        assert_eq!(t.effect, Effect::None);
    }

    #[test]
    fn display_and_serde() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(
            serde_json::to_string(&ConnectionState::Connected).unwrap(),
            "\"connected\""
        );
        assert!(ConnectionState::Connecting.is_active());
        assert!(!ConnectionState::Disconnected.is_active());
    }
}
