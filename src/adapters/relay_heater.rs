//! Relay-switched heating element.
//!
//! Implements [`Actuator`] on top of any `embedded_hal` output pin. While
//! enabled, the relay follows a bang-bang rule around the commanded
//! target:
//!
//! ```text
//!   measured <  target − tol   → relay on
//!   measured >= target + tol   → relay off
//!   in between                 → unchanged
//! ```
//!
//! Independently of the target the heater latches a fault on readings at
//! or above the configured maximum, or on readings that cannot come from a
//! working probe (NaN, below −50, above 500). A temperature fault clears
//! itself once the reading drops below `max − margin`; a pin write fault
//! needs [`Actuator::clear_fault`].

use embedded_hal::digital::OutputPin;
use log::{error, info, warn};

use crate::app::ports::Actuator;

/// Plausible probe range.
const MIN_VALID_READING: f32 = -50.0;
const MAX_VALID_READING: f32 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaterFault {
    OverTemperature(f32),
    InvalidReading,
    PinWrite,
}

pub struct RelayHeater<P> {
    pin: P,
    enabled: bool,
    energised: bool,
    target: f32,
    tolerance: f32,
    max_temperature: f32,
    clear_margin: f32,
    fault: Option<HeaterFault>,
}

impl<P: OutputPin> RelayHeater<P> {
    /// Take ownership of the relay pin and drive it low.
    pub fn new(pin: P, max_temperature: f32, clear_margin: f32) -> Self {
        let mut heater = Self {
            pin,
            enabled: false,
            energised: true,
            target: 0.0,
            tolerance: 0.5,
            max_temperature,
            clear_margin,
            fault: None,
        };
        heater.drive(false);
        heater
    }

    pub fn fault(&self) -> Option<HeaterFault> {
        self.fault
    }

    /// Whether the relay is currently closed.
    pub fn is_energised(&self) -> bool {
        self.energised
    }

    fn drive(&mut self, on: bool) {
        if on == self.energised {
            return;
        }
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.energised = on,
            Err(e) => {
                error!("[heater] relay write failed: {:?}", e);
                self.fault = Some(HeaterFault::PinWrite);
            }
        }
    }

    fn check_limits(&mut self, measured: f32) {
        let invalid =
            measured.is_nan() || !(MIN_VALID_READING..=MAX_VALID_READING).contains(&measured);
        if invalid {
            if self.fault.is_none() {
                warn!("[heater] implausible reading {measured}, latching fault");
            }
            self.fault = Some(HeaterFault::InvalidReading);
            return;
        }
        if measured >= self.max_temperature {
            if self.fault.is_none() {
                warn!(
                    "[heater] {:.1} at or above limit {:.1}, latching fault",
                    measured, self.max_temperature
                );
            }
            self.fault = Some(HeaterFault::OverTemperature(measured));
            return;
        }
        if matches!(
            self.fault,
            Some(HeaterFault::OverTemperature(_) | HeaterFault::InvalidReading)
        ) && measured < self.max_temperature - self.clear_margin
        {
            info!("[heater] reading back to {:.1}, fault cleared", measured);
            self.fault = None;
        }
    }
}

impl<P: OutputPin> Actuator for RelayHeater<P> {
    fn start(&mut self) {
        self.enabled = true;
    }

    fn stop(&mut self) {
        self.enabled = false;
        self.drive(false);
    }

    fn is_running(&self) -> bool {
        self.enabled
    }

    fn set_target(&mut self, value: f32, tolerance: f32) {
        self.target = value;
        self.tolerance = tolerance;
    }

    fn target(&self) -> f32 {
        self.target
    }

    fn has_fault(&self) -> bool {
        self.fault.is_some()
    }

    fn clear_fault(&mut self) {
        if self.fault.take().is_some() {
            info!("[heater] fault cleared by operator");
        }
    }

    fn regulate(&mut self, measured: f32) {
        self.check_limits(measured);
        if self.fault.is_some() || !self.enabled {
            self.drive(false);
            return;
        }
        if measured < self.target - self.tolerance {
            self.drive(true);
        } else if measured >= self.target + self.tolerance {
            self.drive(false);
        }
    }
}
