//! Cross-tab fan-out.
//!
//! Only one tab typically holds the live push connection; the bus mirrors
//! its effects to every other tab of the same browser profile. The medium is
//! at-least-once and unordered from the consumer's perspective, which is why
//! the reconciler's application entry point is idempotent.
//!
//! Echo rules: `publish` skips the originating tab, and applying a received
//! broadcast must never publish again (the receive path goes straight into
//! the reconciler, not back through the bus).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crossbeam::channel::{Receiver, Sender, TryRecvError, unbounded};
use thiserror::Error;
use uuid::Uuid;

use crate::core::TabMessage;

/// Identity of one open tab/window on the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TabId(Uuid);

impl TabId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One tab's inbound end of the well-known channel.
pub struct TabSubscription {
    id: TabId,
    receiver: Receiver<TabMessage>,
}

impl TabSubscription {
    pub fn tab_id(&self) -> TabId {
        self.id
    }

    pub fn try_recv(&self) -> Result<TabMessage, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn drain(&self) -> Vec<TabMessage> {
        self.receiver.try_iter().collect()
    }
}

#[derive(Clone, Default)]
pub struct TabBus {
    inner: Arc<Mutex<BusState>>,
}

#[derive(Default)]
struct BusState {
    subscribers: BTreeMap<TabId, Sender<TabMessage>>,
}

impl TabBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tab on the channel.
    pub fn subscribe(&self) -> Result<TabSubscription, BusError> {
        let id = TabId::generate();
        let (sender, receiver) = unbounded();
        let mut state = self.lock_state()?;
        state.subscribers.insert(id, sender);
        Ok(TabSubscription { id, receiver })
    }

    pub fn unsubscribe(&self, id: TabId) -> Result<(), BusError> {
        let mut state = self.lock_state()?;
        state.subscribers.remove(&id);
        Ok(())
    }

    /// Deliver to every registered tab except the origin. Returns the number
    /// of tabs reached; tabs whose receiving end is gone are pruned.
    pub fn publish(&self, origin: TabId, message: &TabMessage) -> Result<usize, BusError> {
        let mut state = self.lock_state()?;
        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, sender) in &state.subscribers {
            if *id == origin {
                continue;
            }
            match sender.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => gone.push(*id),
            }
        }
        for id in gone {
            state.subscribers.remove(&id);
        }
        Ok(delivered)
    }

    pub fn subscriber_count(&self) -> Result<usize, BusError> {
        Ok(self.lock_state()?.subscribers.len())
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, BusState>, BusError> {
        self.inner.lock().map_err(|_| BusError::LockPoisoned)
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("tab bus lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NotificationEvent, NotificationId};

    fn notification(id: u64) -> TabMessage {
        TabMessage::NewNotification {
            data: NotificationEvent::unread(NotificationId(id), serde_json::json!({}), 0),
        }
    }

    #[test]
    fn publish_skips_the_origin() {
        let bus = TabBus::new();
        let tab_a = bus.subscribe().unwrap();
        let tab_b = bus.subscribe().unwrap();

        let delivered = bus.publish(tab_a.tab_id(), &notification(1)).unwrap();
        assert_eq!(delivered, 1);
        assert!(tab_a.try_recv().is_err());
        assert_eq!(tab_b.drain().len(), 1);
    }

    #[test]
    fn dropped_tabs_are_pruned() {
        let bus = TabBus::new();
        let tab_a = bus.subscribe().unwrap();
        let tab_b = bus.subscribe().unwrap();
        drop(tab_b);

        bus.publish(tab_a.tab_id(), &notification(1)).unwrap();
        assert_eq!(bus.subscriber_count().unwrap(), 1);
    }

    #[test]
    fn unsubscribe_removes_the_tab() {
        let bus = TabBus::new();
        let tab = bus.subscribe().unwrap();
        bus.unsubscribe(tab.tab_id()).unwrap();
        assert_eq!(bus.subscriber_count().unwrap(), 0);
    }
}
