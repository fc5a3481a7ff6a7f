#![forbid(unsafe_code)]

pub mod bus;
pub mod channel;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod reconcile;
#[doc(hidden)]
pub mod test_harness;
pub mod workflow;

pub use error::{Error, ErrorClass};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::core::{
    Artifact, ArtifactKind, ConflictEnvelope, NotificationEvent, NotificationId, OwnerRef,
    PushMessage, SplitChild, SplitError, SplitPlan, TabMessage, Task, TaskId, TaskStatus, TaskType,
};
