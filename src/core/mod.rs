//! Domain types: tasks, split plans, notifications, wire envelopes.

mod domain;
mod envelope;
mod notification;
mod split;
mod task;

pub use domain::{ArtifactKind, TaskStatus, TaskType};
pub use envelope::{ConflictEnvelope, PushMessage, TabMessage, ping_frame};
pub use notification::{NotificationEvent, NotificationId};
pub use split::{SplitChild, SplitError, SplitPlan};
pub use task::{Artifact, OwnerRef, Task, TaskId};
