use thiserror::Error;

use crate::bus::BusError;
use crate::channel::ChannelError;
use crate::client::{MutationError, TransportError};
use crate::reconcile::StoreError;
use crate::workflow::WorkflowError;

/// How a failure should be presented and recovered from.
///
/// This is the spine of the error handling design: every error in the crate
/// resolves to exactly one class, and only the workflow layer turns a class
/// into user-facing copy.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorClass {
    /// Stale version; recoverable only by reload plus explicit human retry.
    Conflict,
    /// Caller lacks the capability; terminal, no retry affordance.
    Permission,
    /// Network/timeout/5xx/malformed response; user-initiated retry is fine,
    /// and the push channel may reconnect automatically.
    Transport,
    /// Client-side precondition failure; never reached the server.
    Validation,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Conflict => "conflict",
            ErrorClass::Permission => "permission",
            ErrorClass::Transport => "transport",
            ErrorClass::Validation => "validation",
        }
    }

    /// Whether retrying without new information may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::Transport)
    }
}

/// Crate-level convenience error.
///
/// A thin transparent wrapper over the per-module errors; classification
/// stays with the module that produced the failure.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Mutation(e) => e.class(),
            Error::Transport(_) => ErrorClass::Transport,
            Error::Channel(_) => ErrorClass::Transport,
            Error::Bus(_) => ErrorClass::Transport,
            Error::Store(_) => ErrorClass::Transport,
            Error::Workflow(e) => e.class(),
        }
    }
}
