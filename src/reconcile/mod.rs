//! Notification reconciliation.
//!
//! Push deliveries, REST snapshots and local mark-as-read actions all land
//! in one place, and application is idempotent: the same event applied twice
//! leaves the list and the unread count exactly as a single application
//! would. That idempotency is what makes the delivery races (HTTP response
//! vs push event, duplicate cross-tab broadcasts) safe.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{NotificationEvent, NotificationId, TabMessage};

/// The only state that survives a full page reload. The detailed list does
/// not: on reload the REST snapshot is authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "unreadCount")]
    pub unread_count: u32,
}

pub trait SummaryStore {
    fn load(&self) -> Result<Option<Summary>, StoreError>;
    fn save(&self, summary: &Summary) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("summary store I/O failed: {reason}")]
    Io { reason: String },

    #[error("summary store payload corrupt: {reason}")]
    Corrupt { reason: String },
}

/// JSON file under a fixed path, written atomically.
pub struct FileSummaryStore {
    path: PathBuf,
}

impl FileSummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SummaryStore for FileSummaryStore {
    fn load(&self) -> Result<Option<Summary>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| StoreError::Io {
            reason: format!("failed to read {}: {e}", self.path.display()),
        })?;
        let summary = serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
            reason: format!("failed to parse {}: {e}", self.path.display()),
        })?;
        Ok(Some(summary))
    }

    fn save(&self, summary: &Summary) -> Result<(), StoreError> {
        let contents = serde_json::to_string(summary).map_err(|e| StoreError::Corrupt {
            reason: e.to_string(),
        })?;
        crate::config::atomic_write(&self.path, contents.as_bytes()).map_err(|e| StoreError::Io {
            reason: e.to_string(),
        })
    }
}

/// In-memory store for tests and headless hosts.
#[derive(Default)]
pub struct MemorySummaryStore {
    inner: Mutex<Option<Summary>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unread(unread_count: u32) -> Self {
        Self {
            inner: Mutex::new(Some(Summary { unread_count })),
        }
    }
}

impl SummaryStore for MemorySummaryStore {
    fn load(&self) -> Result<Option<Summary>, StoreError> {
        Ok(*self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn save(&self, summary: &Summary) -> Result<(), StoreError> {
        *self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(*summary);
        Ok(())
    }
}

pub struct NotificationReconciler<S: SummaryStore> {
    store: S,
    /// Newest first, like the notification drawer renders them.
    items: Vec<NotificationEvent>,
    seen: HashSet<NotificationId>,
    unread: u32,
}

impl<S: SummaryStore> NotificationReconciler<S> {
    /// Restore the persisted unread badge; the list starts empty until the
    /// first snapshot arrives.
    pub fn new(store: S) -> Self {
        let unread = match store.load() {
            Ok(Some(summary)) => summary.unread_count,
            Ok(None) => 0,
            Err(err) => {
                tracing::warn!("persisted notification summary unusable: {err}");
                0
            }
        };
        Self {
            store,
            items: Vec::new(),
            seen: HashSet::new(),
            unread,
        }
    }

    pub fn unread_count(&self) -> u32 {
        self.unread
    }

    pub fn has_unread(&self) -> bool {
        self.unread > 0
    }

    pub fn items(&self) -> &[NotificationEvent] {
        &self.items
    }

    /// Apply one event, whatever its origin (push, broadcast, or local).
    /// A known `id` is a no-op; a new unread event bumps the counter.
    /// Returns whether the event was new.
    pub fn apply_incoming(&mut self, event: NotificationEvent) -> bool {
        if !self.seen.insert(event.id) {
            return false;
        }
        if !event.is_read {
            self.unread += 1;
            self.persist();
        }
        self.items.insert(0, event);
        true
    }

    /// Flip one item to read. Floored at zero: racing a second mark-read
    /// (local or broadcast) never corrupts the counter.
    pub fn mark_read(&mut self, id: NotificationId) -> bool {
        let Some(item) = self.items.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if item.is_read {
            return false;
        }
        item.is_read = true;
        self.unread = self.unread.saturating_sub(1);
        self.persist();
        true
    }

    /// Read everything known as of now. Unconditionally zeroes the counter,
    /// regardless of any prior drift; events arriving afterwards increment
    /// from zero.
    pub fn mark_all_read(&mut self) {
        for item in &mut self.items {
            item.is_read = true;
        }
        self.unread = 0;
        self.persist();
    }

    /// Drop one item; an unread item leaving the list releases its count.
    pub fn remove(&mut self, id: NotificationId) -> bool {
        let Some(index) = self.items.iter().position(|n| n.id == id) else {
            return false;
        };
        let removed = self.items.remove(index);
        self.seen.remove(&id);
        if !removed.is_read {
            self.unread = self.unread.saturating_sub(1);
        }
        self.persist();
        true
    }

    /// Replace local state with the REST snapshot. The fetched unread count
    /// wins over whatever the persisted summary claimed.
    pub fn load_snapshot(&mut self, events: Vec<NotificationEvent>, unread_count: u32) {
        if self.unread != unread_count {
            tracing::debug!(
                persisted = self.unread,
                fetched = unread_count,
                "unread badge corrected by snapshot"
            );
        }
        self.seen = events.iter().map(|n| n.id).collect();
        self.items = events;
        self.unread = unread_count;
        self.persist();
    }

    /// The single entry point for broadcasts received from other tabs.
    /// Never publishes back to the bus.
    pub fn apply_tab_message(&mut self, message: TabMessage) {
        match message {
            TabMessage::NewNotification { data } => {
                self.apply_incoming(data);
            }
            TabMessage::MarkRead { id } => {
                self.mark_read(id);
            }
        }
    }

    fn persist(&self) {
        let summary = Summary {
            unread_count: self.unread,
        };
        if let Err(err) = self.store.save(&summary) {
            tracing::warn!("failed to persist notification summary: {err}");
        }
    }
}
