//! Wire envelopes: push messages, cross-tab broadcasts, conflict bodies.

use serde::{Deserialize, Serialize};

use super::notification::NotificationEvent;
use super::task::TaskId;

/// Inbound push message, tagged by kind. Unknown kinds deserialize to
/// `Unknown` and are ignored by the channel rather than treated as errors.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    ConnectionEstablished {
        #[serde(default)]
        user_id: Option<u64>,
    },
    Notification {
        data: NotificationEvent,
    },
    Heartbeat,
    #[serde(other)]
    Unknown,
}

/// Outbound liveness probe, sent every heartbeat interval while connected.
pub fn ping_frame() -> String {
    r#"{"type":"ping"}"#.to_string()
}

/// Cross-tab broadcast envelope on the well-known device-local channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TabMessage {
    NewNotification { data: NotificationEvent },
    MarkRead { id: super::notification::NotificationId },
}

/// Body of a 409-equivalent rejection. Surfaced verbatim; the client does
/// not invent retry semantics beyond the documented default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEnvelope {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Structured recovery hint from the server, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<String>,
}
