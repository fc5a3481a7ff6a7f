//! The resilient push channel: state machine, backoff, reconnection.

mod backoff;
mod reconnect;
mod socket;
mod state;

pub use backoff::reconnect_delay;
pub use reconnect::{ChannelEvent, ReconnectingChannel};
pub use socket::{ChannelError, Socket, SocketEvent, SocketFactory};
pub use state::ConnectionState;
pub use reconnect::{ThreadTimers, TimerDriver, TimerId, TimerKind};
