//! Socket seam: the channel owns recovery policy, not the transport itself.

use thiserror::Error;

/// Events the underlying transport reports to the channel, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    /// The handshake completed.
    Opened,
    /// One inbound text frame.
    Message(String),
    /// The transport closed, with its close code (1006 = abnormal).
    Closed { code: u16 },
    /// The connect attempt or the live transport failed.
    Failed,
}

/// A live (or in-flight) connection attempt.
pub trait Socket {
    fn send(&mut self, frame: &str) -> Result<(), ChannelError>;
    fn close(&mut self);
}

/// Starts one connection attempt. The resulting socket reports its lifecycle
/// through `SocketEvent`s fed back into the channel by the host event loop.
pub trait SocketFactory {
    fn connect(&mut self) -> Result<Box<dyn Socket>, ChannelError>;
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("socket connect failed: {reason}")]
    Connect { reason: String },

    #[error("socket send failed: {reason}")]
    Send { reason: String },
}
