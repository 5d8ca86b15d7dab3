//! Port traits: the hexagonal boundary between the control plane and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ StateStore / ModeController / Dispatcher
//! ```
//!
//! Driven adapters (sensor, heater, note storage, clock, host control)
//! implement these traits. The core consumes them via generics or boxed
//! trait objects held by the [`Context`](crate::context::Context), so it
//! never touches hardware directly. The transport port lives next to the
//! dispatcher in [`rpc::transport`](crate::rpc::transport).

use crate::error::NoteError;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for a single measured quantity.
///
/// Owned by the actuation loop; never shared with other loops.
pub trait Sensor {
    /// Take one reading.
    fn read_value(&mut self) -> f32;

    /// True while the sensor cannot be trusted (open probe, bus error).
    fn has_fault(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port commanded by the [`ModeController`](crate::fsm::ModeController).
///
/// `start`/`stop` gate the output; `set_target` tells the actuator's
/// own inner loop what to regulate towards while running.
pub trait Actuator {
    fn start(&mut self);

    fn stop(&mut self);

    /// Whether the output is enabled (not whether it is energised right now).
    fn is_running(&self) -> bool;

    /// Regulate towards `value`, tolerating `tolerance` either side.
    fn set_target(&mut self, value: f32, tolerance: f32);

    /// Last commanded target.
    fn target(&self) -> f32;

    /// True while a hardware fault latch is set.
    fn has_fault(&self) -> bool;

    /// Operator-requested fault reset. Adapters without a latch ignore it.
    fn clear_fault(&mut self) {}

    /// Feed the latest measurement to the actuator's inner loop.
    /// Called once per actuation tick, before the mode machine runs.
    fn regulate(&mut self, _measured: f32) {}
}

// ───────────────────────────────────────────────────────────────
// Note storage port (driven adapter: domain ↔ persistent notes)
// ───────────────────────────────────────────────────────────────

/// Named text blobs ("experiment notes") kept outside the state store.
///
/// Called from dispatcher handlers *without* the state lock held, since
/// every implementation of interest does blocking I/O.
pub trait NoteStore: Send + Sync {
    /// Names of all stored notes, sorted.
    fn list(&self) -> Result<Vec<String>, NoteError>;

    /// Load a note; [`NoteError::NotFound`] when absent.
    fn load(&self, name: &str) -> Result<String, NoteError>;

    /// Create or overwrite a note.
    fn save(&self, name: &str, text: &str) -> Result<(), NoteError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds. All timestamps in the state store,
/// history ring and event log come from here.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// System control port
// ───────────────────────────────────────────────────────────────

/// Host-level actions the dispatcher may request.
pub trait SystemControl: Send + Sync {
    /// Ask the host to restart the controller. Fire-and-forget.
    fn request_restart(&self);
}
