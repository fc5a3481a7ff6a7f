//! Conflict-aware task mutations over a generic resource transport.

mod mutation;
mod transport;

pub use mutation::{
    BatchCancelOutcome, MutationClient, MutationError, TaskOperation, is_conflict_error,
    is_permission_error,
};
pub use transport::{Method, ResourceTransport, TransportError, TransportRequest};
