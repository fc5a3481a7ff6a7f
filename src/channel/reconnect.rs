//! The reconnecting push channel.
//!
//! An explicit state machine: the host event loop feeds in socket events and
//! timer firings, and receives channel events on a crossbeam channel. All
//! state lives on one thread; the only concurrency is the timer driver,
//! which reports firings back through the same loop.
//!
//! Recovery policy:
//! - on open: connected, attempt counter reset, liveness probe started
//! - on close/failure: probe stopped, reconnect scheduled after
//!   `min(base * 2^attempts, cap)`, attempts incremented; retry is unbounded
//! - `disconnect()` cancels everything deterministically; no timer fires
//!   after it and no reconnection happens until `connect()` is called again

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::Sender;

use crate::config::ChannelConfig;
use crate::core::{NotificationEvent, PushMessage, ping_frame};

use super::backoff::reconnect_delay;
use super::socket::{ChannelError, Socket, SocketEvent, SocketFactory};
use super::state::ConnectionState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    Reconnect,
    Heartbeat,
}

/// Timer scheduling seam. Production drivers sleep on real threads; tests
/// drive simulated time.
pub trait TimerDriver {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// What the channel reports to its consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    /// Transition notice. Consumers show at most a transient "reconnecting"
    /// indicator; attempt counts and delays are never surfaced.
    StateChanged(ConnectionState),
    /// A push-delivered notification, in arrival order.
    Notification(NotificationEvent),
}

pub struct ReconnectingChannel<F: SocketFactory, D: TimerDriver> {
    factory: F,
    timers: D,
    config: ChannelConfig,
    events: Sender<ChannelEvent>,

    state: ConnectionState,
    attempts: u32,
    socket: Option<Box<dyn Socket>>,
    pending_reconnect: Option<TimerId>,
    heartbeat: Option<TimerId>,
}

impl<F: SocketFactory, D: TimerDriver> ReconnectingChannel<F, D> {
    pub fn new(factory: F, timers: D, config: ChannelConfig, events: Sender<ChannelEvent>) -> Self {
        Self {
            factory,
            timers,
            config,
            events,
            state: ConnectionState::Disconnected,
            attempts: 0,
            socket: None,
            pending_reconnect: None,
            heartbeat: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Begin connecting. A no-op while already connected or connecting.
    pub fn connect(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Connecting
        ) {
            return;
        }
        self.cancel_pending_reconnect();
        self.open_attempt();
    }

    /// Scoped teardown: cancel timers, close the socket, go quiet. No
    /// automatic reconnection happens until `connect()` is called again.
    pub fn disconnect(&mut self) {
        self.cancel_pending_reconnect();
        self.stop_heartbeat();
        if let Some(mut socket) = self.socket.take() {
            socket.close();
        }
        self.transition(ConnectionState::Disconnected);
    }

    /// Feed one socket event from the host loop.
    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Opened => self.on_open(),
            SocketEvent::Message(frame) => self.on_message(&frame),
            SocketEvent::Closed { code } => self.on_closed(code),
            SocketEvent::Failed => self.on_failed(),
        }
    }

    /// Feed one timer firing from the driver. Stale firings (timers that
    /// were cancelled or superseded) are ignored.
    pub fn handle_timer(&mut self, id: TimerId, kind: TimerKind) {
        match kind {
            TimerKind::Reconnect => {
                if self.pending_reconnect != Some(id) {
                    return;
                }
                self.pending_reconnect = None;
                self.open_attempt();
            }
            TimerKind::Heartbeat => {
                if self.heartbeat != Some(id) {
                    return;
                }
                self.heartbeat = None;
                self.send_ping();
                if self.state == ConnectionState::Connected {
                    self.start_heartbeat();
                }
            }
        }
    }

    fn open_attempt(&mut self) {
        self.transition(ConnectionState::Connecting);
        match self.factory.connect() {
            Ok(socket) => {
                self.socket = Some(socket);
                // Connected is reported by the socket via SocketEvent::Opened.
            }
            Err(err) => {
                tracing::warn!("push channel connect failed: {err}");
                self.transition(ConnectionState::Error);
                self.schedule_reconnect();
            }
        }
    }

    fn on_open(&mut self) {
        self.transition(ConnectionState::Connected);
        self.attempts = 0;
        self.start_heartbeat();
        tracing::debug!("push channel connected");
    }

    fn on_message(&mut self, frame: &str) {
        let message = match serde_json::from_str::<PushMessage>(frame) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!("dropping unparseable push frame: {err}");
                return;
            }
        };
        match message {
            PushMessage::Notification { data } => {
                // Arrival order preserved; no batching at this layer.
                let _ = self.events.send(ChannelEvent::Notification(data));
            }
            PushMessage::ConnectionEstablished { user_id } => {
                tracing::debug!(?user_id, "push channel established");
            }
            PushMessage::Heartbeat => {}
            PushMessage::Unknown => {
                // Unknown kinds are ignored, not errors.
            }
        }
    }

    fn on_closed(&mut self, code: u16) {
        if self.socket.is_none() && self.state == ConnectionState::Disconnected {
            // Close event for a socket we already tore down.
            return;
        }
        tracing::debug!(code, "push channel closed");
        self.socket = None;
        self.stop_heartbeat();
        self.transition(ConnectionState::Disconnected);
        self.schedule_reconnect();
    }

    fn on_failed(&mut self) {
        self.socket = None;
        self.stop_heartbeat();
        self.transition(ConnectionState::Error);
        self.schedule_reconnect();
    }

    fn send_ping(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if let Some(socket) = self.socket.as_mut()
            && let Err(err) = socket.send(&ping_frame())
        {
            tracing::warn!("liveness probe send failed: {err}");
        }
    }

    /// Idempotent: at most one reconnect timer is outstanding.
    fn schedule_reconnect(&mut self) {
        self.cancel_pending_reconnect();
        let delay = reconnect_delay(
            self.attempts,
            self.config.backoff_base_ms,
            self.config.backoff_max_ms,
        );
        self.pending_reconnect = Some(self.timers.schedule(TimerKind::Reconnect, delay));
        self.attempts = self.attempts.saturating_add(1);
        tracing::debug!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.attempts,
            "reconnect scheduled"
        );
    }

    fn cancel_pending_reconnect(&mut self) {
        if let Some(id) = self.pending_reconnect.take() {
            self.timers.cancel(id);
        }
    }

    /// Idempotent: cancels any live probe timer before arming a new one.
    fn start_heartbeat(&mut self) {
        self.stop_heartbeat();
        let interval = Duration::from_millis(self.config.heartbeat_interval_ms);
        self.heartbeat = Some(self.timers.schedule(TimerKind::Heartbeat, interval));
    }

    fn stop_heartbeat(&mut self) {
        if let Some(id) = self.heartbeat.take() {
            self.timers.cancel(id);
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid channel transition {} -> {}",
            self.state.as_str(),
            next.as_str()
        );
        self.state = next;
        let _ = self.events.send(ChannelEvent::StateChanged(next));
    }
}

/// Production timer driver: one sleeping thread per outstanding timer,
/// completions delivered on a crossbeam channel, cancellation via a shared
/// tombstone set checked at fire time.
pub struct ThreadTimers {
    completions: Sender<(TimerId, TimerKind)>,
    cancelled: Arc<Mutex<HashSet<u64>>>,
    next_id: Arc<AtomicU64>,
}

impl ThreadTimers {
    pub fn new(completions: Sender<(TimerId, TimerKind)>) -> Self {
        Self {
            completions,
            cancelled: Arc::new(Mutex::new(HashSet::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl TimerDriver for ThreadTimers {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let tx = self.completions.clone();
        let cancelled = Arc::clone(&self.cancelled);
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            let was_cancelled = cancelled
                .lock()
                .map(|mut set| set.remove(&id.0))
                .unwrap_or(false);
            if !was_cancelled {
                // Ignore send errors - receiver may have been dropped.
                let _ = tx.send((id, kind));
            }
        });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Ok(mut set) = self.cancelled.lock() {
            set.insert(id.0);
        }
    }
}
