//! The task collaboration workflow: claim, assign, complete, split, cancel.
//!
//! This is the only layer that decides user-facing presentation. It gates
//! affordances on the injected capability predicate, checks preconditions
//! before spending a round-trip, and turns conflicts into a prompt that
//! names the current holder and one recommended recovery action.

use thiserror::Error;

use crate::client::{MutationClient, MutationError, ResourceTransport, TaskOperation};
use crate::core::{
    ArtifactKind, ConflictEnvelope, SplitChild, SplitError, Task, TaskStatus, TaskType,
};
use crate::error::ErrorClass;

/// Capability predicate, consumed as a boolean oracle. Policy itself lives
/// elsewhere.
pub trait Capabilities {
    fn has_permission(&self, name: &str) -> bool;
    fn has_role(&self, name: &str) -> bool;
}

impl<C: Capabilities + ?Sized> Capabilities for &C {
    fn has_permission(&self, name: &str) -> bool {
        (**self).has_permission(name)
    }

    fn has_role(&self, name: &str) -> bool {
        (**self).has_role(name)
    }
}

/// Permission names the workflow consults.
pub mod permissions {
    pub const CLAIM: &str = "workorder.claim_task";
    pub const ASSIGN: &str = "workorder.assign_task";
    pub const COMPLETE: &str = "workorder.complete_task";
    pub const SPLIT: &str = "workorder.split_task";
    pub const UPDATE_QUANTITY: &str = "workorder.update_task_quantity";
    pub const CANCEL: &str = "workorder.cancel_task";
}

/// The single recommended recovery action shown with a conflict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recovery {
    /// The safe default when the server sends no hint.
    ReloadAndRetry,
    /// The server's structured hint, surfaced verbatim.
    ServerHint(String),
}

impl Recovery {
    pub fn describe(&self) -> &str {
        match self {
            Self::ReloadAndRetry => "reload the task and retry",
            Self::ServerHint(hint) => hint,
        }
    }
}

/// What the user sees when a mutation lost the race: who holds the task now
/// (if known) and exactly one way out. Never leaves the caller guessing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictPrompt {
    pub detail: String,
    pub current_owner: Option<String>,
    pub current_version: Option<u64>,
    pub recovery: Recovery,
}

impl ConflictPrompt {
    pub fn from_envelope(envelope: ConflictEnvelope) -> Self {
        let recovery = match envelope.retry {
            Some(hint) => Recovery::ServerHint(hint),
            None => Recovery::ReloadAndRetry,
        };
        Self {
            detail: envelope.detail,
            current_owner: envelope.current_owner,
            current_version: envelope.current_version,
            recovery,
        }
    }

    pub fn message(&self) -> String {
        match &self.current_owner {
            Some(owner) => format!(
                "{} (currently held by {}); {}",
                self.detail,
                owner,
                self.recovery.describe()
            ),
            None => format!("{}; {}", self.detail, self.recovery.describe()),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("task changed concurrently: {}", .0.detail)]
    Conflict(ConflictPrompt),

    #[error("permission denied: {detail}")]
    PermissionDenied { detail: String },

    #[error("cannot {action} a task in status {}", from.as_str())]
    InvalidTransition {
        action: &'static str,
        from: TaskStatus,
    },

    #[error("task cannot be completed: {reason}")]
    CannotComplete { reason: String },

    #[error("cancellation requires a reason")]
    MissingCancelReason,

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Mutation(MutationError),
}

impl WorkflowError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Conflict(_) => ErrorClass::Conflict,
            Self::PermissionDenied { .. } => ErrorClass::Permission,
            Self::InvalidTransition { .. }
            | Self::CannotComplete { .. }
            | Self::MissingCancelReason
            | Self::Split(_) => ErrorClass::Validation,
            Self::Mutation(err) => err.class(),
        }
    }
}

fn lift(err: MutationError) -> WorkflowError {
    match err {
        MutationError::Conflict(envelope) => {
            WorkflowError::Conflict(ConflictPrompt::from_envelope(envelope))
        }
        MutationError::PermissionDenied { detail } => WorkflowError::PermissionDenied { detail },
        MutationError::InvalidSplit(err) => WorkflowError::Split(err),
        other => WorkflowError::Mutation(other),
    }
}

#[derive(Clone, Debug, Default)]
pub struct CompleteOptions {
    /// Optional by design: the audit trail of a completion is its quantity.
    pub completion_reason: Option<String>,
    pub quantity_defective: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchCancelReport {
    pub cancelled: Vec<Task>,
    pub failed: Vec<(crate::core::TaskId, WorkflowError)>,
}

pub struct TaskWorkflow<T: ResourceTransport, C: Capabilities> {
    client: MutationClient<T>,
    capabilities: C,
}

impl<T: ResourceTransport, C: Capabilities> TaskWorkflow<T, C> {
    pub fn new(client: MutationClient<T>, capabilities: C) -> Self {
        Self {
            client,
            capabilities,
        }
    }

    /// Operator takes an unassigned pending task for themselves.
    pub fn claim(&self, task: &Task, notes: Option<String>) -> Result<Task, WorkflowError> {
        self.require(permissions::CLAIM)?;
        if task.status != TaskStatus::Pending {
            return Err(WorkflowError::InvalidTransition {
                action: "claim",
                from: task.status,
            });
        }
        self.client
            .mutate(task.id, &TaskOperation::Claim { notes }, task.version)
            .map_err(lift)
    }

    /// Supervisor designates a department/operator, including re-dispatch.
    pub fn assign(
        &self,
        task: &Task,
        department: Option<u64>,
        operator: Option<u64>,
        reason: Option<String>,
    ) -> Result<Task, WorkflowError> {
        self.require(permissions::ASSIGN)?;
        if !task.status.is_active() {
            return Err(WorkflowError::InvalidTransition {
                action: "assign",
                from: task.status,
            });
        }
        self.client
            .mutate(
                task.id,
                &TaskOperation::Assign {
                    department,
                    operator,
                    reason,
                },
                task.version,
            )
            .map_err(lift)
    }

    /// Whether completion is currently allowed. Plate-making tasks are held
    /// back until every attached artifact is confirmed.
    pub fn can_complete(&self, task: &Task) -> bool {
        self.cannot_complete_reason(task).is_none()
    }

    /// The precise reason completion is blocked, if it is.
    pub fn cannot_complete_reason(&self, task: &Task) -> Option<String> {
        if task.status != TaskStatus::InProgress {
            return Some(format!(
                "task is {} and cannot be completed",
                task.status.as_str()
            ));
        }
        if task.task_type == TaskType::PlateMaking
            && let Some(artifact) = task.unconfirmed_artifacts().next()
        {
            return Some(format!(
                "{} \"{}\" is not yet confirmed",
                artifact_label(artifact.kind),
                artifact.name
            ));
        }
        None
    }

    /// Complete an in-progress task. The precondition runs before the
    /// mutation: failing fast locally beats a round-trip that ends in a
    /// business-rule rejection.
    pub fn complete(&self, task: &Task, options: CompleteOptions) -> Result<Task, WorkflowError> {
        self.require(permissions::COMPLETE)?;
        if let Some(reason) = self.cannot_complete_reason(task) {
            return Err(WorkflowError::CannotComplete { reason });
        }
        self.client
            .mutate(
                task.id,
                &TaskOperation::Complete {
                    completion_reason: options.completion_reason,
                    quantity_defective: options.quantity_defective,
                    notes: options.notes,
                },
                task.version,
            )
            .map_err(lift)
    }

    /// Atomically replace one active task with N pending children. Either
    /// the whole split lands or the original task is untouched; the
    /// invariants are checked before anything goes on the wire.
    pub fn split(&self, task: &Task, children: Vec<SplitChild>) -> Result<Task, WorkflowError> {
        self.require(permissions::SPLIT)?;
        if !task.status.is_active() {
            return Err(WorkflowError::InvalidTransition {
                action: "split",
                from: task.status,
            });
        }
        self.client
            .split(task, children, task.version)
            .map_err(lift)
    }

    /// Report incremental completed quantity. Violations of the quantity
    /// invariant come back as rejections; the client never clamps.
    pub fn update_quantity(&self, task: &Task, increment: i64) -> Result<Task, WorkflowError> {
        self.require(permissions::UPDATE_QUANTITY)?;
        if !task.status.is_active() {
            return Err(WorkflowError::InvalidTransition {
                action: "update quantity on",
                from: task.status,
            });
        }
        self.client
            .mutate(
                task.id,
                &TaskOperation::UpdateQuantity { increment },
                task.version,
            )
            .map_err(lift)
    }

    /// Cancel one active task. A reason is mandatory: cancellation needs an
    /// audit trail, unlike completion.
    pub fn cancel(&self, task: &Task, reason: &str) -> Result<Task, WorkflowError> {
        self.require(permissions::CANCEL)?;
        if reason.trim().is_empty() {
            return Err(WorkflowError::MissingCancelReason);
        }
        if !task.status.is_active() {
            return Err(WorkflowError::InvalidTransition {
                action: "cancel",
                from: task.status,
            });
        }
        self.client
            .mutate(
                task.id,
                &TaskOperation::Cancel {
                    reason: reason.to_string(),
                },
                task.version,
            )
            .map_err(lift)
    }

    /// Cancel many tasks with one shared reason. Each task carries its own
    /// version check; one stale task does not stop the rest.
    pub fn cancel_batch(&self, tasks: &[Task], reason: &str) -> Result<BatchCancelReport, WorkflowError> {
        self.require(permissions::CANCEL)?;
        if reason.trim().is_empty() {
            return Err(WorkflowError::MissingCancelReason);
        }
        let mut report = BatchCancelReport::default();
        for task in tasks {
            match self.cancel(task, reason) {
                Ok(updated) => report.cancelled.push(updated),
                Err(err) => report.failed.push((task.id, err)),
            }
        }
        Ok(report)
    }

    fn require(&self, permission: &'static str) -> Result<(), WorkflowError> {
        if self.capabilities.has_permission(permission) {
            Ok(())
        } else {
            Err(WorkflowError::PermissionDenied {
                detail: format!("missing permission {permission}"),
            })
        }
    }
}

fn artifact_label(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Artwork => "artwork",
        ArtifactKind::Die => "die",
        ArtifactKind::FoilingPlate => "foiling plate",
        ArtifactKind::EmbossingPlate => "embossing plate",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Artifact, OwnerRef, TaskId};
    use crate::test_harness::{AllowAllCapabilities, RecordingTransport};
    use serde_json::json;

    fn task(status: TaskStatus) -> Task {
        Task {
            id: TaskId(1),
            version: 3,
            status,
            task_type: TaskType::General,
            work_order_process: 7,
            work_content: "print run".into(),
            production_quantity: 100,
            quantity_completed: 0,
            quantity_defective: 0,
            assigned_department: Some(OwnerRef::new(2, "printing")),
            assigned_operator: None,
            parent_task: None,
            artifacts: Vec::new(),
            deadline_ms: None,
        }
    }

    fn task_json(version: u64, status: &str) -> serde_json::Value {
        json!({
            "id": 1,
            "version": version,
            "status": status,
            "task_type": "general",
            "work_order_process": 7,
            "work_content": "print run",
            "production_quantity": 100,
            "quantity_completed": 0,
            "quantity_defective": 0,
        })
    }

    fn workflow(
        transport: &RecordingTransport,
    ) -> TaskWorkflow<&RecordingTransport, AllowAllCapabilities> {
        TaskWorkflow::new(MutationClient::new(transport), AllowAllCapabilities)
    }

    struct NoCapabilities;

    impl Capabilities for NoCapabilities {
        fn has_permission(&self, _name: &str) -> bool {
            false
        }

        fn has_role(&self, _name: &str) -> bool {
            false
        }
    }

    #[test]
    fn claim_requires_pending() {
        let transport = RecordingTransport::default();
        let wf = workflow(&transport);
        let err = wf.claim(&task(TaskStatus::InProgress), None).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation);
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn permission_gate_runs_before_any_round_trip() {
        let transport = RecordingTransport::default();
        let wf = TaskWorkflow::new(MutationClient::new(&transport), NoCapabilities);
        let err = wf.claim(&task(TaskStatus::Pending), None).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Permission);
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn conflict_becomes_a_prompt_with_owner_and_recovery() {
        let transport = RecordingTransport::with_responses(vec![Err(
            crate::client::TransportError {
                status: 409,
                body: json!({
                    "detail": "task updated by another operator",
                    "current_owner": "A",
                    "current_version": 4,
                }),
            },
        )]);
        let wf = workflow(&transport);
        let err = wf.claim(&task(TaskStatus::Pending), None).unwrap_err();
        match err {
            WorkflowError::Conflict(prompt) => {
                assert_eq!(prompt.current_owner.as_deref(), Some("A"));
                assert_eq!(prompt.recovery, Recovery::ReloadAndRetry);
                assert!(prompt.message().contains("held by A"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn server_retry_hint_is_surfaced_verbatim() {
        let transport = RecordingTransport::with_responses(vec![Err(
            crate::client::TransportError {
                status: 409,
                body: json!({ "detail": "stale", "retry": "reload required" }),
            },
        )]);
        let wf = workflow(&transport);
        match wf.claim(&task(TaskStatus::Pending), None).unwrap_err() {
            WorkflowError::Conflict(prompt) => {
                assert_eq!(prompt.recovery, Recovery::ServerHint("reload required".into()));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn plate_making_completion_is_blocked_by_unconfirmed_artifacts() {
        let transport = RecordingTransport::default();
        let wf = workflow(&transport);
        let mut t = task(TaskStatus::InProgress);
        t.task_type = TaskType::PlateMaking;
        t.artifacts = vec![
            Artifact {
                kind: ArtifactKind::Artwork,
                name: "box lid v3".into(),
                confirmed: true,
            },
            Artifact {
                kind: ArtifactKind::FoilingPlate,
                name: "gold crest".into(),
                confirmed: false,
            },
        ];

        assert!(!wf.can_complete(&t));
        let err = wf.complete(&t, CompleteOptions::default()).unwrap_err();
        match &err {
            WorkflowError::CannotComplete { reason } => {
                assert!(reason.contains("foiling plate"));
                assert!(reason.contains("gold crest"));
            }
            other => panic!("expected CannotComplete, got {other:?}"),
        }
        assert_eq!(err.class(), ErrorClass::Validation);
        assert_eq!(transport.request_count(), 0);

        // Confirm the plate and the same task sails through.
        t.artifacts[1].confirmed = true;
        transport.push_response(Ok(task_json(4, "completed")));
        let done = wf.complete(&t, CompleteOptions::default()).expect("complete");
        assert_eq!(done.status, TaskStatus::Completed);
    }

    #[test]
    fn completion_reason_is_optional_but_cancel_reason_is_not() {
        let transport = RecordingTransport::with_responses(vec![Ok(task_json(4, "completed"))]);
        let wf = workflow(&transport);
        wf.complete(&task(TaskStatus::InProgress), CompleteOptions::default())
            .expect("completion without a reason");

        let err = wf.cancel(&task(TaskStatus::Pending), "  ").unwrap_err();
        assert!(matches!(err, WorkflowError::MissingCancelReason));
    }

    #[test]
    fn split_of_terminal_task_is_rejected() {
        let transport = RecordingTransport::default();
        let wf = workflow(&transport);
        let err = wf
            .split(
                &task(TaskStatus::Completed),
                vec![SplitChild::with_quantity(60), SplitChild::with_quantity(40)],
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn batch_cancel_keeps_going_past_failures() {
        let transport = RecordingTransport::with_responses(vec![
            Ok(task_json(5, "cancelled")),
            Err(crate::client::TransportError {
                status: 409,
                body: json!({ "detail": "stale" }),
            }),
        ]);
        let wf = workflow(&transport);
        let mut stale = task(TaskStatus::Pending);
        stale.id = TaskId(2);
        let report = wf
            .cancel_batch(&[task(TaskStatus::Pending), stale], "order withdrawn")
            .expect("batch");
        assert_eq!(report.cancelled.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, TaskId(2));
    }
}
