//! The Task record: identity, optimistic-lock version, quantities, ownership.

use serde::{Deserialize, Serialize};

use super::domain::{ArtifactKind, TaskStatus, TaskType};

/// Server-assigned opaque task identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Weak reference to a department or operator: id plus display name only.
/// The task does not own the referenced entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub id: u64,
    pub name: String,
}

impl OwnerRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A confirmable production artifact (artwork, die, plates).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub name: String,
    pub confirmed: bool,
}

/// A unit of production work.
///
/// `version` is the optimistic lock: bumped by every accepted mutation.
/// Callers replace their local copy wholesale after a successful mutation;
/// the server may have normalized fields beyond what was sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub version: u64,
    pub status: TaskStatus,
    pub task_type: TaskType,
    pub work_order_process: u64,
    pub work_content: String,
    pub production_quantity: u32,
    pub quantity_completed: u32,
    pub quantity_defective: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_department: Option<OwnerRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_operator: Option<OwnerRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    /// Unix ms deadline, if the process step has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl Task {
    pub fn is_subtask(&self) -> bool {
        self.parent_task.is_some()
    }

    /// Completion progress as a whole percentage, capped at 100.
    pub fn progress_percent(&self) -> u32 {
        if self.production_quantity == 0 {
            return 0;
        }
        let pct = (u64::from(self.quantity_completed) * 100) / u64::from(self.production_quantity);
        (pct as u32).min(100)
    }

    /// Quantity invariant as the server enforces it. The client never clamps;
    /// a violating mutation comes back rejected.
    pub fn quantities_consistent(&self) -> bool {
        u64::from(self.quantity_completed) + u64::from(self.quantity_defective)
            <= u64::from(self.production_quantity)
    }

    pub fn is_overdue(&self, now_ms: u64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.deadline_ms.is_some_and(|deadline| deadline < now_ms)
    }

    /// Whole days until the deadline; negative once overdue.
    pub fn days_remaining(&self, now_ms: u64) -> Option<i64> {
        const DAY_MS: i64 = 24 * 60 * 60 * 1_000;
        let deadline = self.deadline_ms? as i64;
        Some((deadline - now_ms as i64).div_euclid(DAY_MS))
    }

    /// Artifacts of the given kind that still need confirmation.
    pub fn unconfirmed_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| !a.confirmed)
    }
}
