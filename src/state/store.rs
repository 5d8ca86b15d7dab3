//! Mutex-guarded shared state store.
//!
//! ```text
//!  actuation loop ──┐
//!  dispatcher     ──┼──▶ try_lock_for(timeout) ──▶ SharedState
//!  aggregation    ──┘          │
//!                              └─▶ None = "no update this tick"
//! ```
//!
//! Every access goes through a bounded wait. A timeout is never an
//! error: the caller skips its tick and retries on the next one. The
//! guard is released on every exit path including unwinding (parking_lot
//! mutexes do not poison). Nothing called inside a locked section may
//! block on I/O or take this lock again.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::app::events::ControllerEvent;
use crate::app::ports::Actuator;
use crate::config::ControllerConfig;
use crate::fsm::{ModeController, ramp_duration_secs};

use super::event_log::{EventEntry, EventLog};
use super::history::{HistoryEntry, HistoryRing};
use super::{ControlPatch, Mode, StateSnapshot, SystemState};

// ---------------------------------------------------------------------------
// SharedState: everything behind the lock
// ---------------------------------------------------------------------------

/// The lock-protected aggregate.
///
/// The actuator sits in here rather than with the actuation loop so that
/// a dispatcher handler can re-arm the mode machine inside the same
/// critical section that changed the setpoints.
pub struct SharedState<A> {
    pub system: SystemState,
    pub history: HistoryRing,
    pub events: EventLog,
    pub modes: ModeController,
    pub actuator: A,
}

impl<A: Actuator> SharedState<A> {
    pub fn new(config: &ControllerConfig, actuator: A) -> Self {
        Self {
            system: SystemState::new(config),
            history: HistoryRing::new(),
            events: EventLog::new(),
            modes: ModeController::new(config.hold_hysteresis, config.control_tolerance),
            actuator,
        }
    }

    pub fn log(&mut self, now_ms: u64, event: &ControllerEvent) {
        self.events.push(now_ms, event.to_string());
    }

    /// Arm the mode machine for `system.mode` using the current setpoints.
    ///
    /// Ramp starts from the last measured value and reaches
    /// `temp_setpoint` at `ramp_rate` units per second.
    pub fn engage_mode(&mut self, now_ms: u64) {
        let s = self.system;
        let act = &mut self.actuator;
        match s.mode {
            Mode::Off => self.modes.set_off(act),
            Mode::Hold => self.modes.set_hold(s.temp_setpoint, act),
            Mode::Timer => self.modes.set_timer(s.duration, Some(s.temp_setpoint), now_ms, act),
            Mode::Ramp => {
                let secs = ramp_duration_secs(s.temperature, s.temp_setpoint, s.ramp_rate);
                self.modes
                    .set_ramp(s.temperature, s.temp_setpoint, secs, now_ms, act);
            }
        }
    }

    /// Merge a validated `controlUpdate` patch, log what changed, re-arm
    /// the mode machine when needed and restart the run clock.
    pub fn apply_control(&mut self, patch: &ControlPatch, now_ms: u64) {
        let mut changes = Vec::new();
        let rearm = self.system.apply_patch(patch, &mut changes);
        for event in &changes {
            self.log(now_ms, event);
        }
        if rearm {
            self.engage_mode(now_ms);
        }
        self.system.start_time_ms = now_ms;
    }

    /// Mirror the mode machine back into `system.mode` after an automatic
    /// transition (completion or fault).
    pub fn sync_mode(&mut self) {
        self.system.mode = self.modes.mode();
    }
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

pub struct StateStore<A> {
    inner: Mutex<SharedState<A>>,
    timeout: Duration,
}

impl<A: Actuator> StateStore<A> {
    pub fn new(shared: SharedState<A>, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(shared),
            timeout,
        }
    }

    /// Default bounded wait.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait up to `timeout` for exclusive access.
    pub fn try_lock(&self, timeout: Duration) -> Option<MutexGuard<'_, SharedState<A>>> {
        self.inner.try_lock_for(timeout)
    }

    /// Run `f` under the lock using the default timeout.
    /// `None` means the lock was not acquired and nothing ran.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut SharedState<A>) -> R) -> Option<R> {
        self.with_lock_timeout(self.timeout, f)
    }

    pub fn with_lock_timeout<R>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&mut SharedState<A>) -> R,
    ) -> Option<R> {
        let mut guard = self.try_lock(timeout)?;
        Some(f(&mut guard))
    }

    /// Copy of the observer-visible state, taken under a short lock.
    pub fn snapshot(&self, now_ms: u64) -> Option<StateSnapshot> {
        self.with_lock(|s| s.system.snapshot(now_ms))
    }

    pub fn append_history(&self, value: f32, timestamp_ms: u64) -> bool {
        self.with_lock(|s| s.history.push(timestamp_ms, value)).is_some()
    }

    pub fn append_event(&self, description: impl Into<String>, timestamp_ms: u64) -> bool {
        self.with_lock(|s| s.events.push(timestamp_ms, description))
            .is_some()
    }

    /// History oldest to newest, as of the moment the lock was held.
    pub fn list_history_chronological(&self) -> Option<Vec<HistoryEntry>> {
        self.with_lock(|s| s.history.chronological())
    }

    pub fn list_events(&self) -> Option<Vec<EventEntry>> {
        self.with_lock(|s| s.events.to_vec())
    }
}
