//! Controller configuration parameters
//!
//! All tunable parameters for the SmartPlate control plane.
//! Values come from [`ControllerConfig::default()`] or a JSON file passed
//! to the host binary; every load is validated before use.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Core controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // --- Loop timing ---
    /// Actuation loop period (milliseconds)
    pub actuation_interval_ms: u64,
    /// Session-service loop period (milliseconds)
    pub session_interval_ms: u64,
    /// Aggregation/broadcast loop period (milliseconds)
    pub aggregation_interval_ms: u64,
    /// Maximum wait for the state store lock (milliseconds)
    pub lock_timeout_ms: u64,

    // --- Control ---
    /// Hold-mode hysteresis band below the target
    pub hold_hysteresis: f32,
    /// Tolerance handed to the actuator for Ramp/Timer targets
    pub control_tolerance: f32,
    /// Ramp rate (units per second) used until a client supplies one
    pub default_ramp_rate: f32,
    /// Hold setpoint armed at startup; `None` starts in Off
    pub initial_hold_setpoint: Option<f32>,

    // --- Heater safety ---
    /// Heater latches a fault at or above this reading
    pub max_temperature: f32,
    /// Fault self-clears once the reading drops this far below the limit
    pub fault_clear_margin: f32,

    // --- Alerts (initial values, patchable at runtime) ---
    pub alert_temp_threshold: f32,
    pub alert_rpm_threshold: f32,
    /// Seconds
    pub alert_timer_threshold: u32,

    // --- History ---
    /// Smallest change in the measured value worth recording
    pub history_change_threshold: f32,
    /// Record a point at least this often even when the value is flat
    pub history_keepalive_ms: u64,

    // --- Host binary ---
    pub listen_addr: String,
    pub notes_dir: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Loop timing
            actuation_interval_ms: 500,
            session_interval_ms: 50,
            aggregation_interval_ms: 100,
            lock_timeout_ms: 100,

            // Control
            hold_hysteresis: 1.0,
            control_tolerance: 0.5,
            default_ramp_rate: 1.0,
            initial_hold_setpoint: Some(30.0),

            // Heater safety
            max_temperature: 70.0,
            fault_clear_margin: 5.0,

            // Alerts
            alert_temp_threshold: 85.0,
            alert_rpm_threshold: 1500.0,
            alert_timer_threshold: 3600,

            // History
            history_change_threshold: 0.1,
            history_keepalive_ms: 10_000,

            // Host binary
            listen_addr: "0.0.0.0:8080".into(),
            notes_dir: "notes".into(),
        }
    }
}

impl ControllerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&text)
    }

    /// Reject values the control loops cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actuation_interval_ms == 0
            || self.session_interval_ms == 0
            || self.aggregation_interval_ms == 0
        {
            return Err(ConfigError::ValidationFailed("loop intervals must be non-zero"));
        }
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("lock_timeout_ms must be non-zero"));
        }
        if !positive(self.hold_hysteresis) {
            return Err(ConfigError::ValidationFailed("hold_hysteresis must be > 0"));
        }
        if !positive(self.control_tolerance) {
            return Err(ConfigError::ValidationFailed("control_tolerance must be > 0"));
        }
        if !positive(self.default_ramp_rate) {
            return Err(ConfigError::ValidationFailed("default_ramp_rate must be > 0"));
        }
        if !self.max_temperature.is_finite() || !self.fault_clear_margin.is_finite() {
            return Err(ConfigError::ValidationFailed("heater limits must be finite"));
        }
        if self.fault_clear_margin < 0.0 {
            return Err(ConfigError::ValidationFailed("fault_clear_margin must be >= 0"));
        }
        if self.initial_hold_setpoint.is_some_and(|t| !t.is_finite()) {
            return Err(ConfigError::ValidationFailed("initial_hold_setpoint must be finite"));
        }
        if !self.history_change_threshold.is_finite() || self.history_change_threshold < 0.0 {
            return Err(ConfigError::ValidationFailed("history_change_threshold must be >= 0"));
        }
        Ok(())
    }
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}
