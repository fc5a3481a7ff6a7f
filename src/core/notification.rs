//! Notification events: push-delivered or REST-fetched facts.

use serde::{Deserialize, Serialize};

/// Globally unique across REST snapshots and push delivery, which is what
/// makes the reconciler's duplicate suppression sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: NotificationId,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub is_read: bool,
    /// Unix ms at delivery; informational only, never used for dedup.
    #[serde(default)]
    pub received_at: u64,
}

impl NotificationEvent {
    pub fn unread(id: NotificationId, payload: serde_json::Value, received_at: u64) -> Self {
        Self {
            id,
            payload,
            is_read: false,
            received_at,
        }
    }
}
