//! Deterministic fakes shared by unit and integration tests.
//!
//! Nothing here sleeps or touches the network: time is advanced manually,
//! sockets are scripted, and transports replay canned responses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::channel::{ChannelError, Socket, SocketFactory, TimerDriver, TimerId, TimerKind};
use crate::client::{ResourceTransport, TransportError, TransportRequest};
use crate::workflow::Capabilities;

/// Simulated wall clock, milliseconds since an arbitrary epoch.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<AtomicU64>,
}

impl TestClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    pub fn advance_ms(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new(0)
    }
}

struct ScheduledTimer {
    id: TimerId,
    kind: TimerKind,
    delay: Duration,
    fire_at_ms: u64,
}

struct ManualTimerState {
    now_ms: u64,
    next_id: u64,
    scheduled: Vec<ScheduledTimer>,
}

/// Timer driver under test control: timers fire only when simulated time is
/// advanced past their horizon, and cancellation removes them outright.
#[derive(Clone)]
pub struct ManualTimers {
    state: Arc<Mutex<ManualTimerState>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualTimerState {
                now_ms: 0,
                next_id: 1,
                scheduled: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualTimerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Outstanding timers as `(id, kind, scheduled delay)`, soonest first.
    pub fn pending(&self) -> Vec<(TimerId, TimerKind, Duration)> {
        let mut state = self.lock();
        state.scheduled.sort_by_key(|t| t.fire_at_ms);
        state
            .scheduled
            .iter()
            .map(|t| (t.id, t.kind, t.delay))
            .collect()
    }

    pub fn pending_kinds(&self) -> Vec<TimerKind> {
        self.pending().into_iter().map(|(_, kind, _)| kind).collect()
    }

    /// Advance simulated time, returning every timer that fired, in fire
    /// order. The caller feeds them back into the component under test.
    pub fn advance(&self, delta: Duration) -> Vec<(TimerId, TimerKind, Duration)> {
        let mut state = self.lock();
        state.now_ms += delta.as_millis() as u64;
        let now = state.now_ms;
        let mut fired: Vec<ScheduledTimer> = Vec::new();
        let mut remaining = Vec::new();
        for timer in state.scheduled.drain(..) {
            if timer.fire_at_ms <= now {
                fired.push(timer);
            } else {
                remaining.push(timer);
            }
        }
        state.scheduled = remaining;
        fired.sort_by_key(|t| t.fire_at_ms);
        fired.into_iter().map(|t| (t.id, t.kind, t.delay)).collect()
    }
}

impl Default for ManualTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDriver for ManualTimers {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        let mut state = self.lock();
        let id = TimerId(state.next_id);
        state.next_id += 1;
        let fire_at_ms = state.now_ms + delay.as_millis() as u64;
        state.scheduled.push(ScheduledTimer {
            id,
            kind,
            delay,
            fire_at_ms,
        });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        let mut state = self.lock();
        state.scheduled.retain(|t| t.id != id);
    }
}

#[derive(Default)]
struct SocketRecord {
    sent: Vec<String>,
    closed: bool,
}

/// Shared view of every socket a `ScriptedFactory` handed out.
#[derive(Clone, Default)]
pub struct SocketRegistry {
    records: Arc<Mutex<Vec<SocketRecord>>>,
}

impl SocketRegistry {
    pub fn socket_count(&self) -> usize {
        self.lock().len()
    }

    pub fn sent_frames(&self, socket_index: usize) -> Vec<String> {
        self.lock()
            .get(socket_index)
            .map(|r| r.sent.clone())
            .unwrap_or_default()
    }

    pub fn total_sent_frames(&self) -> usize {
        self.lock().iter().map(|r| r.sent.len()).sum()
    }

    pub fn was_closed(&self, socket_index: usize) -> bool {
        self.lock().get(socket_index).is_some_and(|r| r.closed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SocketRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct ScriptedSocket {
    registry: SocketRegistry,
    index: usize,
}

impl Socket for ScriptedSocket {
    fn send(&mut self, frame: &str) -> Result<(), ChannelError> {
        let mut records = self.registry.lock();
        if let Some(record) = records.get_mut(self.index) {
            record.sent.push(frame.to_string());
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut records = self.registry.lock();
        if let Some(record) = records.get_mut(self.index) {
            record.closed = true;
        }
    }
}

/// Connect attempts succeed or fail by script; every produced socket is
/// observable through the shared registry.
pub struct ScriptedFactory {
    registry: SocketRegistry,
    failures_remaining: usize,
    attempts: Arc<AtomicU64>,
}

impl ScriptedFactory {
    pub fn always_ok() -> Self {
        Self::failing_times(0)
    }

    /// The first `n` connect attempts fail; the rest succeed.
    pub fn failing_times(n: usize) -> Self {
        Self {
            registry: SocketRegistry::default(),
            failures_remaining: n,
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn sockets(&self) -> SocketRegistry {
        self.registry.clone()
    }

    pub fn connect_attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl SocketFactory for ScriptedFactory {
    fn connect(&mut self) -> Result<Box<dyn Socket>, ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(ChannelError::Connect {
                reason: "scripted failure".to_string(),
            });
        }
        let index = {
            let mut records = self.registry.lock();
            records.push(SocketRecord::default());
            records.len() - 1
        };
        Ok(Box::new(ScriptedSocket {
            registry: self.registry.clone(),
            index,
        }))
    }
}

/// Transport that replays canned responses and records every request, so
/// tests can assert both payload shape and round-trip counts.
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl RecordingTransport {
    pub fn with_responses(
        responses: impl IntoIterator<Item = Result<Value, TransportError>>,
    ) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: Result<Value, TransportError>) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }
}

impl ResourceTransport for RecordingTransport {
    fn request(&self, req: TransportRequest) -> Result<Value, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(req);
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("no scripted response")))
    }
}

/// Capability predicate that grants everything; tests needing denial build
/// their own predicate inline.
pub struct AllowAllCapabilities;

impl Capabilities for AllowAllCapabilities {
    fn has_permission(&self, _name: &str) -> bool {
        true
    }

    fn has_role(&self, _name: &str) -> bool {
        true
    }
}
