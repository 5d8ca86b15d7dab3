//! Operator-visible controller events.
//!
//! Handlers and the actuation loop raise these; the state store renders
//! them to text via `Display` and keeps them in the bounded
//! [`EventLog`](crate::state::event_log::EventLog).

use core::fmt;

use crate::state::Mode;

/// Why the output was forced off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSource {
    Actuator,
    Sensor,
}

/// Structured events recorded by the control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The loops came up (carries the initial mode).
    Started(Mode),

    SetpointChanged { from: f32, to: f32 },

    RpmSetpointChanged { from: f32, to: f32 },

    /// A client selected a mode (also logged when re-selecting the same one).
    ModeChanged(Mode),

    DurationChanged(u32),

    RampRateChanged(f32),

    AlertThresholdsChanged,

    /// Ramp or Timer ran to completion; the controller is now Off.
    ModeCompleted(Mode),

    FaultDetected(FaultSource),

    FaultCleared,
}

impl fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started(mode) => write!(f, "Controller started in {mode} mode"),
            Self::SetpointChanged { from, to } => {
                write!(f, "Temperature setpoint changed from {from:.1} to {to:.1}")
            }
            Self::RpmSetpointChanged { from, to } => {
                write!(f, "RPM setpoint changed from {from:.0} to {to:.0}")
            }
            Self::ModeChanged(mode) => write!(f, "Mode changed to: {mode}"),
            Self::DurationChanged(secs) => write!(f, "Duration changed to {secs}"),
            Self::RampRateChanged(rate) => write!(f, "Ramp rate changed to {rate:.2}"),
            Self::AlertThresholdsChanged => write!(f, "Alert thresholds updated"),
            Self::ModeCompleted(mode) => write!(f, "{mode} completed, output off"),
            Self::FaultDetected(FaultSource::Actuator) => {
                write!(f, "Heater fault detected, output disabled")
            }
            Self::FaultDetected(FaultSource::Sensor) => {
                write!(f, "Sensor fault detected, output disabled")
            }
            Self::FaultCleared => write!(f, "Fault cleared"),
        }
    }
}
