//! Mock adapters for integration tests.
//!
//! Records every actuator call and every outbound message so tests can
//! assert on the full history without a network or real relay.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use smartplate::adapters::notes::MemoryNoteStore;
use smartplate::adapters::system::RestartLatch;
use smartplate::adapters::time::ManualClock;
use smartplate::app::ports::{Actuator, Sensor};
use smartplate::config::ControllerConfig;
use smartplate::context::Context;
use smartplate::error::TransportError;
use smartplate::rpc::channels::InboundQueue;
use smartplate::rpc::session::ClientId;
use smartplate::rpc::transport::Transport;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    Start,
    Stop,
    SetTarget { value: f32, tolerance: f32 },
    ClearFault,
}

// ── MockActuator ──────────────────────────────────────────────

/// Actuator whose fault latch is driven from the test through a shared flag.
pub struct MockActuator {
    pub calls: Vec<ActuatorCall>,
    running: bool,
    target: f32,
    fault: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockActuator {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            running: false,
            target: 0.0,
            fault: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for injecting and clearing faults while the actuator sits
    /// inside the state store.
    pub fn fault_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fault)
    }

    pub fn last_target(&self) -> Option<f32> {
        self.calls.iter().rev().find_map(|c| match c {
            ActuatorCall::SetTarget { value, .. } => Some(*value),
            _ => None,
        })
    }
}

impl Default for MockActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl Actuator for MockActuator {
    fn start(&mut self) {
        self.running = true;
        self.calls.push(ActuatorCall::Start);
    }

    fn stop(&mut self) {
        self.running = false;
        self.calls.push(ActuatorCall::Stop);
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_target(&mut self, value: f32, tolerance: f32) {
        self.target = value;
        self.calls.push(ActuatorCall::SetTarget { value, tolerance });
    }

    fn target(&self) -> f32 {
        self.target
    }

    fn has_fault(&self) -> bool {
        self.fault.load(Ordering::SeqCst)
    }

    fn clear_fault(&mut self) {
        self.fault.store(false, Ordering::SeqCst);
        self.calls.push(ActuatorCall::ClearFault);
    }
}

// ── ScriptedSensor ────────────────────────────────────────────

/// Returns queued readings in order; the last one repeats.
pub struct ScriptedSensor {
    readings: VecDeque<f32>,
    last: f32,
    pub fault: bool,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn new(readings: &[f32]) -> Self {
        Self {
            readings: readings.iter().copied().collect(),
            last: readings.first().copied().unwrap_or(0.0),
            fault: false,
        }
    }

    pub fn constant(value: f32) -> Self {
        Self::new(&[value])
    }

    pub fn push(&mut self, value: f32) {
        self.readings.push_back(value);
    }
}

impl Sensor for ScriptedSensor {
    fn read_value(&mut self) -> f32 {
        if let Some(v) = self.readings.pop_front() {
            self.last = v;
        }
        self.last
    }

    fn has_fault(&self) -> bool {
        self.fault
    }
}

// ── RecordingTransport ───────────────────────────────────────

#[derive(Default)]
struct Outbox {
    sent: Vec<(ClientId, String)>,
    broadcasts: Vec<String>,
}

/// Transport that keeps every message. Clones share the same outbox so
/// the test can hold one while the context owns another.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    outbox: Arc<Mutex<Outbox>>,
    clients: Arc<AtomicUsize>,
    connected: Arc<Mutex<HashSet<ClientId>>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clients(&self, n: usize) {
        self.clients.store(n, Ordering::SeqCst);
    }

    pub fn connect(&self, client_id: ClientId) {
        self.connected.lock().insert(client_id);
    }

    pub fn disconnect(&self, client_id: ClientId) {
        self.connected.lock().remove(&client_id);
    }

    pub fn sent_to(&self, client_id: ClientId) -> Vec<String> {
        self.outbox
            .lock()
            .sent
            .iter()
            .filter(|(id, _)| *id == client_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.outbox.lock().broadcasts.clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, client_id: ClientId, text: &str) -> Result<(), TransportError> {
        self.outbox.lock().sent.push((client_id, text.to_owned()));
        Ok(())
    }

    fn broadcast(&self, text: &str) -> Result<(), TransportError> {
        self.outbox.lock().broadcasts.push(text.to_owned());
        Ok(())
    }

    fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    fn is_connected(&self, client_id: ClientId) -> bool {
        self.connected.lock().contains(&client_id)
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A fully wired context plus handles to its test doubles.
pub struct Rig {
    pub ctx: Context<MockActuator>,
    pub clock: ManualClock,
    pub transport: RecordingTransport,
    pub latch: RestartLatch,
    pub inbound: Arc<InboundQueue>,
    pub actuator_fault: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let clock = ManualClock::new(1_000);
        let transport = RecordingTransport::new();
        let latch = RestartLatch::new();
        let inbound = Arc::new(InboundQueue::new());
        let actuator = MockActuator::new();
        let actuator_fault = actuator.fault_flag();
        let ctx = Context::new(
            config,
            actuator,
            Arc::clone(&inbound),
            Box::new(clock.clone()),
            Box::new(MemoryNoteStore::new()),
            Box::new(transport.clone()),
            Box::new(latch.clone()),
        );
        Self {
            ctx,
            clock,
            transport,
            latch,
            inbound,
            actuator_fault,
        }
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}

/// Defaults with a short lock wait so timeout tests stay fast.
pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        lock_timeout_ms: 20,
        ..ControllerConfig::default()
    }
}
