//! Explicit runtime context.
//!
//! Built once at startup and passed by reference into every loop and
//! dispatcher handler. Nothing in the crate reaches for a global.

use std::sync::Arc;
use std::time::Duration;

use crate::app::ports::{Actuator, Clock, NoteStore, SystemControl};
use crate::config::ControllerConfig;
use crate::rpc::channels::InboundQueue;
use crate::rpc::transport::Transport;
use crate::state::store::{SharedState, StateStore};

pub struct Context<A> {
    pub config: ControllerConfig,
    pub store: StateStore<A>,
    pub inbound: Arc<InboundQueue>,
    pub clock: Box<dyn Clock>,
    pub notes: Box<dyn NoteStore>,
    pub transport: Box<dyn Transport>,
    pub system: Box<dyn SystemControl>,
}

impl<A: Actuator> Context<A> {
    /// Assemble the context. The store starts in Off; call
    /// [`Context::arm_initial_mode`] to apply the configured startup hold.
    pub fn new(
        config: ControllerConfig,
        actuator: A,
        inbound: Arc<InboundQueue>,
        clock: Box<dyn Clock>,
        notes: Box<dyn NoteStore>,
        transport: Box<dyn Transport>,
        system: Box<dyn SystemControl>,
    ) -> Self {
        let shared = SharedState::new(&config, actuator);
        let store = StateStore::new(shared, Duration::from_millis(config.lock_timeout_ms));
        Self {
            config,
            store,
            inbound,
            clock,
            notes,
            transport,
            system,
        }
    }

    /// Arm Hold at `initial_hold_setpoint` (if configured) and log the start.
    /// Returns `false` if the store could not be locked.
    pub fn arm_initial_mode(&self) -> bool {
        let now = self.clock.now_ms();
        let initial = self.config.initial_hold_setpoint;
        self.store
            .with_lock(|s| {
                if let Some(target) = initial {
                    s.system.temp_setpoint = target;
                    s.system.mode = crate::state::Mode::Hold;
                }
                s.engage_mode(now);
                s.system.start_time_ms = now;
                let started = crate::app::events::ControllerEvent::Started(s.system.mode);
                s.log(now, &started);
            })
            .is_some()
    }
}
