//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters. Everything runs on the host with no hardware
//! and, apart from the TCP round trip, no sockets.

mod dispatcher_tests;
mod mock_hw;
