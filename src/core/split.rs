//! Split plans: decomposing one task into independent child tasks.
//!
//! Invariants are validated at construction so an invalid plan is
//! unrepresentable past this point and never reaches the transport.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::task::Task;

/// One child in a split plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitChild {
    pub production_quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_department: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_operator: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_content: Option<String>,
}

impl SplitChild {
    pub fn with_quantity(production_quantity: u32) -> Self {
        Self {
            production_quantity,
            assigned_department: None,
            assigned_operator: None,
            work_content: None,
        }
    }
}

/// A validated split: at least two children whose quantities sum exactly to
/// the parent's production quantity, every child strictly positive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SplitPlan {
    children: Vec<SplitChild>,
}

impl SplitPlan {
    pub fn for_task(task: &Task, children: Vec<SplitChild>) -> Result<Self, SplitError> {
        Self::new(task.production_quantity, children)
    }

    pub fn new(parent_quantity: u32, children: Vec<SplitChild>) -> Result<Self, SplitError> {
        if children.len() < 2 {
            return Err(SplitError::TooFewChildren {
                got: children.len(),
            });
        }
        for (index, child) in children.iter().enumerate() {
            if child.production_quantity == 0 {
                return Err(SplitError::ZeroQuantityChild { index });
            }
        }
        let total: u64 = children
            .iter()
            .map(|c| u64::from(c.production_quantity))
            .sum();
        if total != u64::from(parent_quantity) {
            return Err(SplitError::QuantityMismatch {
                expected: parent_quantity,
                got: total,
            });
        }
        Ok(Self { children })
    }

    pub fn children(&self) -> &[SplitChild] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("a split needs at least 2 children (got {got})")]
    TooFewChildren { got: usize },

    #[error("split child {index} has zero production quantity")]
    ZeroQuantityChild { index: usize },

    #[error("split quantities must sum to the parent quantity {expected} (got {got})")]
    QuantityMismatch { expected: u32, got: u64 },
}
