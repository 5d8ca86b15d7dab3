//! Simulated plant for running the controller without hardware.
//!
//! | Adapter            | Implements            | Models                      |
//! |--------------------|-----------------------|-----------------------------|
//! | [`SimRelayPin`]    | `embedded_hal` output | relay coil                  |
//! | [`SimThermalSensor`] | `Sensor`            | hotplate with ambient loss  |
//! | [`SimStirrer`]     | `Sensor`              | stirrer speed sweep         |

use core::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::app::ports::{Clock, Sensor};

// ── Relay pin ────────────────────────────────────────────────

/// Output pin whose level is visible to the thermal model.
#[derive(Clone, Default)]
pub struct SimRelayPin {
    level: Arc<AtomicBool>,
}

impl SimRelayPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

impl ErrorType for SimRelayPin {
    type Error = Infallible;
}

impl OutputPin for SimRelayPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.store(false, Ordering::Release);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.store(true, Ordering::Release);
        Ok(())
    }
}

// ── Thermal model ────────────────────────────────────────────

/// First-order plate model: heats at `heat_rate` °C/s while the relay is
/// closed and relaxes towards ambient at `loss_coeff` per second.
pub struct SimThermalSensor<C> {
    relay: SimRelayPin,
    clock: C,
    temperature: f32,
    ambient: f32,
    heat_rate: f32,
    loss_coeff: f32,
    last_ms: Option<u64>,
}

impl<C: Clock> SimThermalSensor<C> {
    pub fn new(relay: SimRelayPin, clock: C, ambient: f32) -> Self {
        Self {
            relay,
            clock,
            temperature: ambient,
            ambient,
            heat_rate: 0.8,
            loss_coeff: 0.01,
            last_ms: None,
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    fn step(&mut self, dt_secs: f32) {
        let heating = if self.relay.is_high() {
            self.heat_rate
        } else {
            0.0
        };
        let loss = self.loss_coeff * (self.temperature - self.ambient);
        self.temperature += (heating - loss) * dt_secs;
    }
}

impl<C: Clock> Sensor for SimThermalSensor<C> {
    fn read_value(&mut self) -> f32 {
        let now = self.clock.now_ms();
        if let Some(last) = self.last_ms {
            let dt = now.saturating_sub(last) as f32 / 1000.0;
            self.step(dt);
        }
        self.last_ms = Some(now);
        self.temperature
    }

    fn has_fault(&self) -> bool {
        false
    }
}

// ── Stirrer ──────────────────────────────────────────────────

pub const RPM_MIN: f32 = 100.0;
pub const RPM_MAX: f32 = 200.0;
const RPM_STEP: f32 = 10.0;

/// Sweeps between [`RPM_MIN`] and [`RPM_MAX`] one step per read.
pub struct SimStirrer {
    rpm: f32,
    rising: bool,
}

impl Default for SimStirrer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimStirrer {
    pub fn new() -> Self {
        Self {
            rpm: RPM_MIN,
            rising: true,
        }
    }
}

impl Sensor for SimStirrer {
    fn read_value(&mut self) -> f32 {
        let current = self.rpm;
        if self.rising {
            self.rpm += RPM_STEP;
            if self.rpm >= RPM_MAX {
                self.rpm = RPM_MAX;
                self.rising = false;
            }
        } else {
            self.rpm -= RPM_STEP;
            if self.rpm <= RPM_MIN {
                self.rpm = RPM_MIN;
                self.rising = true;
            }
        }
        current
    }

    fn has_fault(&self) -> bool {
        false
    }
}
