//! Domain enums.
//!
//! TaskStatus: draft, pending, in_progress, completed, skipped, cancelled
//! TaskType: general, plate_making, cutting, printing, post_processing
//! ArtifactKind: the confirmable production artifacts attached to a task

use serde::{Deserialize, Serialize};

/// Task lifecycle status.
///
/// Terminal states are completed, cancelled and skipped; a task never leaves
/// a terminal state and is never physically deleted once past draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Draft,
    Pending,
    InProgress,
    Completed,
    Skipped,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Skipped)
    }

    /// Active = eligible for claim/assign/split/cancel.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

/// Production task classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    General,
    PlateMaking,
    Cutting,
    Printing,
    PostProcessing,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::PlateMaking => "plate_making",
            Self::Cutting => "cutting",
            Self::Printing => "printing",
            Self::PostProcessing => "post_processing",
        }
    }
}

/// Confirmable artifact kinds attached to plate-making tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Artwork,
    Die,
    FoilingPlate,
    EmbossingPlate,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artwork => "artwork",
            Self::Die => "die",
            Self::FoilingPlate => "foiling_plate",
            Self::EmbossingPlate => "embossing_plate",
        }
    }

    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Artwork,
        ArtifactKind::Die,
        ArtifactKind::FoilingPlate,
        ArtifactKind::EmbossingPlate,
    ];
}
