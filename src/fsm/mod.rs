//! Mode state machine.
//!
//! Turns the selected mode and its parameters into actuator commands:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ActiveMode                                                  │
//! │  ┌────────┬──────────────────────────┬─────────────────────┐ │
//! │  │ Mode   │ parameters               │ update()            │ │
//! │  ├────────┼──────────────────────────┼─────────────────────┤ │
//! │  │ Off    │ -                        │ keep output stopped │ │
//! │  │ Ramp   │ start, end, dur, t0      │ interpolate target  │ │
//! │  │ Hold   │ target                   │ bang-bang, band H   │ │
//! │  │ Timer  │ dur, t0, target?         │ run until elapsed   │ │
//! │  └────────┴──────────────────────────┴─────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transitions only happen through the explicit `set_*` calls, plus the
//! two automatic fall-backs to Off: Ramp/Timer completion and an actuator
//! fault. Parameters live inside the [`ActiveMode`] variant, so a stale
//! set of parameters can never outlive its mode.
//!
//! `update()` normally runs with the state store lock held. The
//! completion and fault callbacks are therefore invoked synchronously and
//! must neither block nor perform I/O.

use log::{info, warn};

use crate::app::ports::Actuator;
use crate::state::Mode;

// ---------------------------------------------------------------------------
// Mode parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampParams {
    pub start_value: f32,
    pub end_value: f32,
    pub duration_ms: u64,
    pub start_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldParams {
    pub target: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerParams {
    pub duration_ms: u64,
    pub start_ms: u64,
    /// Drive towards this value while the timer runs.
    pub target: Option<f32>,
}

/// The active mode and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ActiveMode {
    #[default]
    Off,
    Ramp(RampParams),
    Hold(HoldParams),
    Timer(TimerParams),
}

impl ActiveMode {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Off => Mode::Off,
            Self::Ramp(_) => Mode::Ramp,
            Self::Hold(_) => Mode::Hold,
            Self::Timer(_) => Mode::Timer,
        }
    }
}

/// What a single `update()` call observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeOutcome {
    /// Normal tick.
    Steady,
    /// The given mode finished this tick; the controller is now Off.
    Completed(Mode),
    /// First tick of a fault episode.
    FaultDetected,
    /// Fault still present.
    FaultPersisting,
    /// The actuator no longer reports the fault seen on earlier ticks.
    FaultCleared,
}

/// Single-slot callback. Registering again replaces the previous one.
/// Runs under the state lock: must not block, must not re-enter the store.
pub type ModeCallback = Box<dyn FnMut() + Send>;

/// Ramp duration for moving `from → to` at `rate` units per second,
/// rounded up to whole seconds.
pub fn ramp_duration_secs(from: f32, to: f32, rate: f32) -> u32 {
    if !(rate.is_finite() && rate > 0.0) {
        return 0;
    }
    ((to - from).abs() / rate).ceil() as u32
}

// ---------------------------------------------------------------------------
// ModeController
// ---------------------------------------------------------------------------

pub struct ModeController {
    active: ActiveMode,
    /// Hold band below the target.
    hysteresis: f32,
    /// Tolerance passed with Ramp/Timer targets.
    tolerance: f32,
    fault_latched: bool,
    on_complete: Option<ModeCallback>,
    on_fault: Option<ModeCallback>,
}

impl ModeController {
    pub fn new(hysteresis: f32, tolerance: f32) -> Self {
        Self {
            active: ActiveMode::Off,
            hysteresis,
            tolerance,
            fault_latched: false,
            on_complete: None,
            on_fault: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.active.mode()
    }

    pub fn active(&self) -> &ActiveMode {
        &self.active
    }

    pub fn hysteresis(&self) -> f32 {
        self.hysteresis
    }

    /// Replace the completion callback (last registration wins).
    pub fn set_on_complete(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Replace the fault callback (last registration wins).
    pub fn set_on_fault(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_fault = Some(Box::new(callback));
    }

    // ── Transitions ─────────────────────────────────────────────

    /// Stop the output and go to Off. Idempotent. The last target is kept.
    pub fn set_off<A: Actuator + ?Sized>(&mut self, act: &mut A) {
        act.stop();
        if self.active != ActiveMode::Off {
            info!("[mode] {} -> Off", self.mode());
        }
        self.active = ActiveMode::Off;
    }

    /// Ramp from `start_value` to `end_value` over `duration_secs`.
    pub fn set_ramp<A: Actuator + ?Sized>(
        &mut self,
        start_value: f32,
        end_value: f32,
        duration_secs: u32,
        now_ms: u64,
        act: &mut A,
    ) {
        self.active = ActiveMode::Ramp(RampParams {
            start_value,
            end_value,
            duration_ms: u64::from(duration_secs) * 1000,
            start_ms: now_ms,
        });
        act.set_target(start_value, self.tolerance);
        act.start();
        info!(
            "[mode] Ramp {:.1} -> {:.1} over {}s",
            start_value, end_value, duration_secs
        );
    }

    /// Hold `target` with the configured hysteresis band.
    ///
    /// The actuator is told the same band as its tolerance so its own
    /// inner loop never fights the hold rule.
    pub fn set_hold<A: Actuator + ?Sized>(&mut self, target: f32, act: &mut A) {
        self.active = ActiveMode::Hold(HoldParams { target });
        act.set_target(target, self.hysteresis);
        act.start();
        info!("[mode] Hold {:.1}", target);
    }

    /// Run the output for `duration_secs`, optionally regulating to `target`.
    pub fn set_timer<A: Actuator + ?Sized>(
        &mut self,
        duration_secs: u32,
        target: Option<f32>,
        now_ms: u64,
        act: &mut A,
    ) {
        self.active = ActiveMode::Timer(TimerParams {
            duration_ms: u64::from(duration_secs) * 1000,
            start_ms: now_ms,
            target,
        });
        if let Some(t) = target {
            act.set_target(t, self.tolerance);
        }
        act.start();
        info!("[mode] Timer {}s (target {:?})", duration_secs, target);
    }

    /// Forced shutdown from outside (e.g. a faulted sensor): runs the
    /// fault callback and drops to Off.
    pub fn fault<A: Actuator + ?Sized>(&mut self, act: &mut A) {
        if let Some(cb) = self.on_fault.as_mut() {
            cb();
        }
        self.set_off(act);
    }

    /// An operator cleared the actuator fault. Ends the current episode so
    /// the next tick does not report the clear a second time.
    pub fn acknowledge_fault(&mut self) {
        self.fault_latched = false;
    }

    // ── Tick ────────────────────────────────────────────────────

    /// Advance one control tick. Call exactly once per actuation tick.
    pub fn update<A: Actuator + ?Sized>(
        &mut self,
        measured: f32,
        now_ms: u64,
        act: &mut A,
    ) -> ModeOutcome {
        // Fault check precedes every mode.
        if act.has_fault() {
            let first = !self.fault_latched;
            self.fault_latched = true;
            if first {
                warn!("[mode] actuator fault in {}, forcing Off", self.mode());
            }
            self.fault(act);
            return if first {
                ModeOutcome::FaultDetected
            } else {
                ModeOutcome::FaultPersisting
            };
        }

        let cleared = core::mem::replace(&mut self.fault_latched, false);

        let outcome = match self.active {
            ActiveMode::Off => {
                if act.is_running() {
                    act.stop();
                }
                ModeOutcome::Steady
            }
            ActiveMode::Ramp(p) => self.tick_ramp(p, now_ms, act),
            ActiveMode::Hold(p) => {
                self.tick_hold(p, measured, act);
                ModeOutcome::Steady
            }
            ActiveMode::Timer(p) => self.tick_timer(p, now_ms, act),
        };

        if cleared && outcome == ModeOutcome::Steady {
            ModeOutcome::FaultCleared
        } else {
            outcome
        }
    }

    fn tick_ramp<A: Actuator + ?Sized>(
        &mut self,
        p: RampParams,
        now_ms: u64,
        act: &mut A,
    ) -> ModeOutcome {
        let elapsed = now_ms.saturating_sub(p.start_ms);
        let progress = if p.duration_ms == 0 {
            1.0
        } else {
            (elapsed as f32 / p.duration_ms as f32).clamp(0.0, 1.0)
        };

        if progress >= 1.0 {
            act.set_target(p.end_value, self.tolerance);
            self.complete(Mode::Ramp, act);
            return ModeOutcome::Completed(Mode::Ramp);
        }

        let target = p.start_value + (p.end_value - p.start_value) * progress;
        act.set_target(target, self.tolerance);
        ModeOutcome::Steady
    }

    fn tick_hold<A: Actuator + ?Sized>(&mut self, p: HoldParams, measured: f32, act: &mut A) {
        if !act.is_running() && measured < p.target - self.hysteresis {
            act.start();
        } else if act.is_running() && measured >= p.target {
            act.stop();
        }
    }

    fn tick_timer<A: Actuator + ?Sized>(
        &mut self,
        p: TimerParams,
        now_ms: u64,
        act: &mut A,
    ) -> ModeOutcome {
        if !act.is_running() {
            act.start();
        }
        if let Some(t) = p.target {
            act.set_target(t, self.tolerance);
        }
        if now_ms.saturating_sub(p.start_ms) >= p.duration_ms {
            self.complete(Mode::Timer, act);
            return ModeOutcome::Completed(Mode::Timer);
        }
        ModeOutcome::Steady
    }

    fn complete<A: Actuator + ?Sized>(&mut self, mode: Mode, act: &mut A) {
        info!("[mode] {} complete", mode);
        if let Some(cb) = self.on_complete.as_mut() {
            cb();
        }
        self.set_off(act);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
