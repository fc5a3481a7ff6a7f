//! Version-stamped task mutations with typed failure classification.
//!
//! Every mutation transmits the version the caller last observed. A stale
//! version comes back as a conflict; the client never retries a conflict on
//! its own, because doing so would silently overwrite another operator's
//! change. Recovery is reload plus an explicit human decision.

use serde_json::{Value, json};
use thiserror::Error;

use crate::core::{ConflictEnvelope, SplitChild, SplitError, SplitPlan, Task, TaskId};
use crate::error::ErrorClass;

use super::transport::{ResourceTransport, TransportError, TransportRequest};

/// Transport status reserved for "resource state changed concurrently".
const STATUS_CONFLICT: u16 = 409;
/// Transport status for a capability the caller lacks.
const STATUS_FORBIDDEN: u16 = 403;

/// Structured code classification. Pure functions of the error shape; no
/// message-string matching beyond the documented `code` field.
pub fn is_conflict_error(err: &TransportError) -> bool {
    err.status == STATUS_CONFLICT || err.code() == Some("version_conflict")
}

pub fn is_permission_error(err: &TransportError) -> bool {
    err.status == STATUS_FORBIDDEN || err.code() == Some("permission_denied")
}

/// One task mutation, with the payload the server expects for it.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskOperation {
    Claim {
        notes: Option<String>,
    },
    Assign {
        department: Option<u64>,
        operator: Option<u64>,
        reason: Option<String>,
    },
    Complete {
        completion_reason: Option<String>,
        quantity_defective: u32,
        notes: Option<String>,
    },
    UpdateQuantity {
        increment: i64,
    },
    Split {
        plan: SplitPlan,
    },
    Cancel {
        reason: String,
    },
}

impl TaskOperation {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Claim { .. } => "claim",
            Self::Assign { .. } => "assign",
            Self::Complete { .. } => "complete",
            Self::UpdateQuantity { .. } => "update_quantity",
            Self::Split { .. } => "split",
            Self::Cancel { .. } => "cancel",
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::Claim { notes } => json!({ "notes": notes.clone().unwrap_or_default() }),
            Self::Assign {
                department,
                operator,
                reason,
            } => json!({
                "assigned_department": department,
                "assigned_operator": operator,
                "reason": reason,
            }),
            Self::Complete {
                completion_reason,
                quantity_defective,
                notes,
            } => json!({
                "completion_reason": completion_reason.clone().unwrap_or_default(),
                "quantity_defective": quantity_defective,
                "notes": notes.clone().unwrap_or_default(),
            }),
            Self::UpdateQuantity { increment } => json!({ "quantity_increment": increment }),
            Self::Split { plan } => json!({ "splits": plan.children() }),
            Self::Cancel { reason } => json!({ "reason": reason }),
        }
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    /// Stale version. Carries the server's envelope verbatim.
    #[error("concurrent update rejected: {}", .0.detail)]
    Conflict(ConflictEnvelope),

    #[error("permission denied: {detail}")]
    PermissionDenied { detail: String },

    #[error(transparent)]
    Transport(TransportError),

    #[error(transparent)]
    InvalidSplit(#[from] SplitError),

    #[error("malformed task in response: {reason}")]
    MalformedResponse { reason: String },
}

impl MutationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Conflict(_) => ErrorClass::Conflict,
            Self::PermissionDenied { .. } => ErrorClass::Permission,
            Self::Transport(_) | Self::MalformedResponse { .. } => ErrorClass::Transport,
            Self::InvalidSplit(_) => ErrorClass::Validation,
        }
    }
}

/// Wraps the single logical task-mutation endpoint.
pub struct MutationClient<T: ResourceTransport> {
    transport: T,
    base_url: String,
}

impl<T: ResourceTransport> MutationClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_base_url(transport, "/workorder-tasks/")
    }

    pub fn with_base_url(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    /// Perform one mutation against `task_id` at `expected_version`.
    ///
    /// On success the returned task is the server's authoritative record;
    /// callers replace their local copy wholesale. Exactly one transport
    /// round-trip is issued per call, whatever the outcome.
    pub fn mutate(
        &self,
        task_id: TaskId,
        operation: &TaskOperation,
        expected_version: u64,
    ) -> Result<Task, MutationError> {
        let mut body = operation.payload();
        match body.as_object_mut() {
            Some(map) => {
                map.insert("version".to_string(), json!(expected_version));
            }
            None => {
                return Err(MutationError::MalformedResponse {
                    reason: "operation payload is not an object".to_string(),
                });
            }
        }
        let url = format!("{}{}/{}/", self.base_url, task_id, operation.endpoint());
        tracing::debug!(
            task = %task_id,
            op = operation.endpoint(),
            version = expected_version,
            "issuing task mutation"
        );

        match self.transport.request(TransportRequest::post(url, body)) {
            Ok(value) => parse_task(value),
            Err(err) => Err(classify(err)),
        }
    }

    /// Split with fail-fast client-side validation: an invalid plan is
    /// rejected with a precise message before any network call.
    pub fn split(
        &self,
        task: &Task,
        children: Vec<SplitChild>,
        expected_version: u64,
    ) -> Result<Task, MutationError> {
        let plan = SplitPlan::for_task(task, children)?;
        self.mutate(task.id, &TaskOperation::Split { plan }, expected_version)
    }

    /// Cancel several tasks, each with its own version check. Failures do
    /// not stop the batch; each task gets its own classified outcome.
    pub fn cancel_batch(
        &self,
        tasks: &[(TaskId, u64)],
        reason: &str,
    ) -> BatchCancelOutcome {
        let mut outcome = BatchCancelOutcome::default();
        let operation = TaskOperation::Cancel {
            reason: reason.to_string(),
        };
        for &(task_id, version) in tasks {
            match self.mutate(task_id, &operation, version) {
                Ok(task) => outcome.cancelled.push(task),
                Err(err) => outcome.failed.push((task_id, err)),
            }
        }
        outcome
    }
}

#[derive(Debug, Default)]
pub struct BatchCancelOutcome {
    pub cancelled: Vec<Task>,
    pub failed: Vec<(TaskId, MutationError)>,
}

/// Success bodies either are the task or wrap it under `"task"`
/// (custom actions return the latter shape).
fn parse_task(value: Value) -> Result<Task, MutationError> {
    let task_value = match value.get("task") {
        Some(inner) => inner.clone(),
        None => value,
    };
    serde_json::from_value(task_value).map_err(|e| MutationError::MalformedResponse {
        reason: e.to_string(),
    })
}

fn classify(err: TransportError) -> MutationError {
    if is_conflict_error(&err) {
        let envelope = serde_json::from_value::<ConflictEnvelope>(err.body.clone())
            .unwrap_or_else(|_| ConflictEnvelope {
                detail: err
                    .detail()
                    .unwrap_or("task changed concurrently")
                    .to_string(),
                current_owner: None,
                current_version: None,
                task_id: None,
                retry: None,
            });
        return MutationError::Conflict(envelope);
    }
    if is_permission_error(&err) {
        return MutationError::PermissionDenied {
            detail: err
                .detail()
                .unwrap_or("you do not have permission to perform this action")
                .to_string(),
        };
    }
    MutationError::Transport(err)
}
