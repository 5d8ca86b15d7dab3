//! Application core boundary.
//!
//! The control plane talks to hardware, storage and the host only
//! through the **port traits** in [`ports`]; [`events`] holds the typed
//! entries that end up in the operator-visible event log.

pub mod events;
pub mod ports;
