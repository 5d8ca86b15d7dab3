//! Scheduler harness: the three periodic loops.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  actuation  (≈500 ms)   sensor → ModeController → history    │
//! │  session    (≈50 ms)    InboundQueue → CommandDispatcher     │
//! │  aggregation (≈100 ms)  StateStore snapshot → broadcast      │
//! │                                                              │
//! │  The loops share nothing but the StateStore lock.            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each loop runs one iteration to completion, then sleeps its fixed
//! interval. The per-iteration bodies are plain functions
//! ([`actuation_tick`], [`session_tick`], [`aggregation_tick`]) so they
//! can be driven step by step from tests with a manual clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::events::{ControllerEvent, FaultSource};
use crate::app::ports::{Actuator, Sensor};
use crate::context::Context;
use crate::fsm::ModeOutcome;
use crate::rpc::dispatcher::CommandDispatcher;
use crate::rpc::protocol::Reply;

// ═══════════════════════════════════════════════════════════════
//  Tick results
// ═══════════════════════════════════════════════════════════════

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// State was read and/or written.
    Updated,
    /// Lock not acquired within the bound; retry next tick.
    LockTimeout,
    /// Nothing to do (e.g. no observers connected).
    Idle,
}

// ═══════════════════════════════════════════════════════════════
//  Actuation
// ═══════════════════════════════════════════════════════════════

/// State carried between actuation ticks.
#[derive(Debug, Default)]
pub struct ActuationState {
    /// Last point written to the history ring: (time, value).
    last_recorded: Option<(u64, f32)>,
    sensor_fault: bool,
}

impl ActuationState {
    pub fn new() -> Self {
        Self::default()
    }

    fn should_record(&self, now_ms: u64, value: f32, threshold: f32, keepalive_ms: u64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self.last_recorded {
            None => true,
            Some((t, v)) => {
                (value - v).abs() >= threshold || now_ms.saturating_sub(t) >= keepalive_ms
            }
        }
    }
}

/// One actuation iteration: read sensors (outside the lock), then under
/// the lock publish the readings, run the mode machine and record history.
pub fn actuation_tick<A, S, R>(
    ctx: &Context<A>,
    temperature: &mut S,
    stirrer: &mut R,
    state: &mut ActuationState,
) -> TickOutcome
where
    A: Actuator,
    S: Sensor + ?Sized,
    R: Sensor + ?Sized,
{
    let measured = temperature.read_value();
    let sensor_fault = temperature.has_fault();
    let rpm = stirrer.read_value();
    let now = ctx.clock.now_ms();

    let Some(mut guard) = ctx.store.try_lock(ctx.store.timeout()) else {
        warn!("[actuation] state lock timeout, skipping tick");
        return TickOutcome::LockTimeout;
    };
    let s = &mut *guard;

    s.system.temperature = measured;
    s.system.rpm = rpm;

    if sensor_fault {
        if !state.sensor_fault {
            warn!("[actuation] sensor fault, forcing Off");
            s.log(now, &ControllerEvent::FaultDetected(FaultSource::Sensor));
        }
        state.sensor_fault = true;
        s.modes.fault(&mut s.actuator);
    } else {
        if state.sensor_fault {
            info!("[actuation] sensor recovered");
            s.log(now, &ControllerEvent::FaultCleared);
            state.sensor_fault = false;
        }
        match s.modes.update(measured, now, &mut s.actuator) {
            ModeOutcome::Completed(mode) => s.log(now, &ControllerEvent::ModeCompleted(mode)),
            ModeOutcome::FaultDetected => {
                s.log(now, &ControllerEvent::FaultDetected(FaultSource::Actuator));
            }
            ModeOutcome::FaultCleared => s.log(now, &ControllerEvent::FaultCleared),
            ModeOutcome::Steady | ModeOutcome::FaultPersisting => {}
        }
        // A limit tripped here de-energises the output at once; the mode
        // machine sees the fault on the next tick.
        s.actuator.regulate(measured);
    }
    s.sync_mode();

    let cfg = &ctx.config;
    if state.should_record(
        now,
        measured,
        cfg.history_change_threshold,
        cfg.history_keepalive_ms,
    ) {
        s.history.push(now, measured);
        state.last_recorded = Some((now, measured));
    }

    TickOutcome::Updated
}

// ═══════════════════════════════════════════════════════════════
//  Session service
// ═══════════════════════════════════════════════════════════════

/// Drain inbound messages into the dispatcher. Returns how many were handled.
pub fn session_tick<A: Actuator>(ctx: &Context<A>, dispatcher: &mut CommandDispatcher) -> usize {
    let n = dispatcher.service(ctx);
    if n > 0 {
        debug!("[session] handled {n} message(s)");
    }
    n
}

// ═══════════════════════════════════════════════════════════════
//  Aggregation
// ═══════════════════════════════════════════════════════════════

/// Snapshot the state and push a `dataUpdate` to every observer.
pub fn aggregation_tick<A: Actuator>(ctx: &Context<A>) -> TickOutcome {
    if ctx.transport.client_count() == 0 {
        return TickOutcome::Idle;
    }
    let now = ctx.clock.now_ms();
    let Some(data) = ctx.store.snapshot(now) else {
        warn!("[aggregation] state lock timeout, skipping broadcast");
        return TickOutcome::LockTimeout;
    };
    // Lock released; serialise and send.
    if let Err(e) = ctx.transport.broadcast(&Reply::DataUpdate { data }.to_json()) {
        warn!("[aggregation] broadcast failed: {e}");
    }
    TickOutcome::Updated
}

// ═══════════════════════════════════════════════════════════════
//  Harness
// ═══════════════════════════════════════════════════════════════

fn periodic(shutdown: &AtomicBool, interval: Duration, mut body: impl FnMut()) {
    while !shutdown.load(Ordering::Acquire) {
        body();
        thread::sleep(interval);
    }
}

/// A loop failed to spawn: stop the ones already running so the scope
/// can join them.
fn stop_on_err<T>(r: std::io::Result<T>, shutdown: &AtomicBool) -> std::io::Result<T> {
    if r.is_err() {
        shutdown.store(true, Ordering::Release);
    }
    r
}

/// Run the three loops until `shutdown` is set.
///
/// Each loop gets its own named thread; they meet only at the state
/// store lock and the inbound queue.
pub fn run<A, S, R>(
    ctx: &Context<A>,
    temperature: &mut S,
    stirrer: &mut R,
    shutdown: &AtomicBool,
) -> std::io::Result<()>
where
    A: Actuator + Send,
    S: Sensor + Send,
    R: Sensor + Send,
{
    let cfg = &ctx.config;
    let actuation_every = Duration::from_millis(cfg.actuation_interval_ms);
    let session_every = Duration::from_millis(cfg.session_interval_ms);
    let aggregation_every = Duration::from_millis(cfg.aggregation_interval_ms);

    info!(
        "[scheduler] starting loops: actuation {:?}, session {:?}, aggregation {:?}",
        actuation_every, session_every, aggregation_every
    );

    thread::scope(|scope| -> std::io::Result<()> {
        thread::Builder::new()
            .name("actuation".into())
            .spawn_scoped(scope, move || {
                let mut state = ActuationState::new();
                periodic(shutdown, actuation_every, || {
                    actuation_tick(ctx, temperature, stirrer, &mut state);
                });
            })?;
        let session = thread::Builder::new()
            .name("session".into())
            .spawn_scoped(scope, move || {
                let mut dispatcher = CommandDispatcher::new();
                periodic(shutdown, session_every, || {
                    session_tick(ctx, &mut dispatcher);
                });
            });
        stop_on_err(session, shutdown)?;
        let aggregation = thread::Builder::new()
            .name("aggregation".into())
            .spawn_scoped(scope, move || {
                periodic(shutdown, aggregation_every, || {
                    aggregation_tick(ctx);
                });
            });
        stop_on_err(aggregation, shutdown)?;
        Ok(())
    })?;

    info!("[scheduler] loops stopped");
    Ok(())
}
