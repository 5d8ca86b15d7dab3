//! SmartPlate control plane library.
//!
//! Shared state store, mode state machine, JSON command dispatcher and
//! the three-loop scheduler harness, plus host-side adapters. Exposed as a
//! library for integration testing; the `smartplate` binary wires it up.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod fsm;
pub mod rpc;
pub mod scheduler;
pub mod state;
