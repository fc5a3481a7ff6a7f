//! Connection state machine.

use serde::{Deserialize, Serialize};

/// Push channel state. `Error` is cosmetic, not terminal: the reconnection
/// loop keeps running through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// The strict transition table. Teardown to `Disconnected` is allowed
    /// from every state.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connected) => true,
            (Connecting, Error) => true,
            (Connected, Error) => true,
            (Error, Connecting) => true,
            _ => false,
        }
    }
}
