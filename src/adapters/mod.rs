//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements           | Connects to                  |
//! |-----------------|----------------------|------------------------------|
//! | `relay_heater`  | Actuator             | relay on an embedded-hal pin |
//! | `notes`         | NoteStore            | filesystem / memory          |
//! | `tcp_transport` | Transport            | newline-delimited JSON / TCP |
//! | `time`          | Clock                | `Instant` / manual           |
//! | `system`        | SystemControl        | process restart latch        |
//! | `sim`           | Sensor, OutputPin    | simulated hotplate + stirrer |

pub mod notes;
pub mod relay_heater;
pub mod sim;
pub mod system;
pub mod tcp_transport;
pub mod time;
