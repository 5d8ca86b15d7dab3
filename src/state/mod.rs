//! Live controller state and its wire views.
//!
//! [`SystemState`] is the single mutable record behind the
//! [`StateStore`](store::StateStore) lock. Everything that leaves the lock
//! is a copied view: [`StateSnapshot`] for `dataUpdate` pushes and
//! [`ConfigView`] for `getConfig` replies.

pub mod event_log;
pub mod history;
pub mod store;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::app::events::ControllerEvent;
use crate::config::ControllerConfig;
use crate::error::DispatchError;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Active control strategy. Exactly one is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Mode {
    #[default]
    Off,
    Ramp,
    Hold,
    Timer,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Off, Mode::Ramp, Mode::Hold, Mode::Timer];

    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Ramp => "Ramp",
            Self::Hold => "Hold",
            Self::Timer => "Timer",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for Mode {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::from_name(&name).ok_or_else(|| format!("unknown mode '{name}'"))
    }
}

// ---------------------------------------------------------------------------
// SystemState
// ---------------------------------------------------------------------------

/// The live record. Setpoints are stored as given; the mode handlers
/// decide what to do with them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemState {
    /// Latest measured temperature.
    pub temperature: f32,
    /// Latest measured stirrer speed.
    pub rpm: f32,
    pub temp_setpoint: f32,
    pub rpm_setpoint: f32,
    pub mode: Mode,
    /// Timer duration in seconds.
    pub duration: u32,
    /// Ramp rate in units per second.
    pub ramp_rate: f32,
    pub alert_temp_threshold: f32,
    pub alert_rpm_threshold: f32,
    /// Seconds.
    pub alert_timer_threshold: u32,
    /// Clock reading (ms) when the current run started.
    pub start_time_ms: u64,
}

impl SystemState {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            temperature: 0.0,
            rpm: 0.0,
            temp_setpoint: config.initial_hold_setpoint.unwrap_or(0.0),
            rpm_setpoint: 0.0,
            mode: Mode::Off,
            duration: 0,
            ramp_rate: config.default_ramp_rate,
            alert_temp_threshold: config.alert_temp_threshold,
            alert_rpm_threshold: config.alert_rpm_threshold,
            alert_timer_threshold: config.alert_timer_threshold,
            start_time_ms: 0,
        }
    }

    /// Copy of the fields pushed to observers.
    pub fn snapshot(&self, now_ms: u64) -> StateSnapshot {
        StateSnapshot {
            temperature: self.temperature,
            rpm: self.rpm,
            mode: self.mode,
            temp_setpoint: self.temp_setpoint,
            rpm_setpoint: self.rpm_setpoint,
            duration: self.duration,
            alert_temp_threshold: self.alert_temp_threshold,
            alert_rpm_threshold: self.alert_rpm_threshold,
            alert_timer_threshold: self.alert_timer_threshold,
            running_time: now_ms.saturating_sub(self.start_time_ms) / 1000,
        }
    }

    pub fn config_view(&self) -> ConfigView {
        ConfigView {
            temp_setpoint: self.temp_setpoint,
            rpm_setpoint: self.rpm_setpoint,
            mode: self.mode,
            duration: self.duration,
            ramp_rate: self.ramp_rate,
            alert_temp_threshold: self.alert_temp_threshold,
            alert_rpm_threshold: self.alert_rpm_threshold,
            alert_timer_threshold: self.alert_timer_threshold,
        }
    }

    /// Merge every field present in `patch`, pushing one event per change.
    ///
    /// Returns `true` when the active mode has to be (re)armed: a mode was
    /// named explicitly, or a parameter the current mode runs on changed.
    pub fn apply_patch(&mut self, patch: &ControlPatch, events: &mut Vec<ControllerEvent>) -> bool {
        let mut setpoint_changed = false;
        let mut duration_changed = false;
        let mut rate_changed = false;

        if let Some(to) = patch.temp_setpoint {
            if to != self.temp_setpoint {
                events.push(ControllerEvent::SetpointChanged {
                    from: self.temp_setpoint,
                    to,
                });
                self.temp_setpoint = to;
                setpoint_changed = true;
            }
        }
        if let Some(to) = patch.rpm_setpoint {
            if to != self.rpm_setpoint {
                events.push(ControllerEvent::RpmSetpointChanged {
                    from: self.rpm_setpoint,
                    to,
                });
                self.rpm_setpoint = to;
            }
        }
        if let Some(secs) = patch.duration {
            if secs != self.duration {
                events.push(ControllerEvent::DurationChanged(secs));
                self.duration = secs;
                duration_changed = true;
            }
        }
        if let Some(rate) = patch.ramp_rate {
            if rate != self.ramp_rate {
                events.push(ControllerEvent::RampRateChanged(rate));
                self.ramp_rate = rate;
                rate_changed = true;
            }
        }

        let mut alerts_changed = false;
        if let Some(v) = patch.alert_temp_threshold {
            alerts_changed |= v != self.alert_temp_threshold;
            self.alert_temp_threshold = v;
        }
        if let Some(v) = patch.alert_rpm_threshold {
            alerts_changed |= v != self.alert_rpm_threshold;
            self.alert_rpm_threshold = v;
        }
        if let Some(v) = patch.alert_timer_threshold {
            alerts_changed |= v != self.alert_timer_threshold;
            self.alert_timer_threshold = v;
        }
        if alerts_changed {
            events.push(ControllerEvent::AlertThresholdsChanged);
        }

        if let Some(mode) = patch.mode {
            events.push(ControllerEvent::ModeChanged(mode));
            self.mode = mode;
            return true;
        }

        match self.mode {
            Mode::Off => false,
            Mode::Hold => setpoint_changed,
            Mode::Timer => setpoint_changed || duration_changed,
            Mode::Ramp => setpoint_changed || rate_changed,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire views
// ---------------------------------------------------------------------------

/// Body of a `dataUpdate` push.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub temperature: f32,
    pub rpm: f32,
    pub mode: Mode,
    pub temp_setpoint: f32,
    pub rpm_setpoint: f32,
    pub duration: u32,
    #[serde(rename = "alertTempThreshold")]
    pub alert_temp_threshold: f32,
    #[serde(rename = "alertRpmThreshold")]
    pub alert_rpm_threshold: f32,
    #[serde(rename = "alertTimerThreshold")]
    pub alert_timer_threshold: u32,
    /// Whole seconds since the run started.
    pub running_time: u64,
}

/// Body of a `getConfig` reply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfigView {
    pub temp_setpoint: f32,
    pub rpm_setpoint: f32,
    pub mode: Mode,
    pub duration: u32,
    pub ramp_rate: f32,
    #[serde(rename = "alertTempThreshold")]
    pub alert_temp_threshold: f32,
    #[serde(rename = "alertRpmThreshold")]
    pub alert_rpm_threshold: f32,
    #[serde(rename = "alertTimerThreshold")]
    pub alert_timer_threshold: u32,
}

// ---------------------------------------------------------------------------
// ControlPatch
// ---------------------------------------------------------------------------

/// Typed `controlUpdate` payload. Absent fields leave state untouched;
/// unknown fields are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControlPatch {
    pub temp_setpoint: Option<f32>,
    pub rpm_setpoint: Option<f32>,
    pub mode: Option<Mode>,
    pub duration: Option<u32>,
    pub ramp_rate: Option<f32>,
    #[serde(rename = "alertTempThreshold")]
    pub alert_temp_threshold: Option<f32>,
    #[serde(rename = "alertRpmThreshold")]
    pub alert_rpm_threshold: Option<f32>,
    #[serde(rename = "alertTimerThreshold")]
    pub alert_timer_threshold: Option<u32>,
}

impl ControlPatch {
    /// Range checks that the type system does not cover.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.ramp_rate.is_some_and(|r| !(r.is_finite() && r > 0.0)) {
            return Err(DispatchError::InvalidRampRate);
        }
        Ok(())
    }
}
