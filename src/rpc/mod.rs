//! JSON command subsystem.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Command Stack                           │
//! │                                                            │
//! │  ┌───────────┐   ┌──────────────┐   ┌───────────────────┐ │
//! │  │ Transport │──▶│ InboundQueue │──▶│ CommandDispatcher │ │
//! │  │ (adapter) │   │ (channels)   │   │ → StateStore      │ │
//! │  └───────────┘   └──────────────┘   └───────────────────┘ │
//! │       ▲                                       │            │
//! │       │            Reply / dataUpdate         │            │
//! │       └───────────────────────────────────────┘            │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod dispatcher;
pub mod protocol;
pub mod session;
pub mod transport;
