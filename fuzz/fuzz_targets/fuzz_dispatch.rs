//! Fuzz target: `CommandDispatcher::dispatch`
//!
//! Feeds arbitrary text through the full dispatcher against a simulated
//! heater and asserts that every message gets exactly one reply (the
//! lock is never contended here) and that the state stays readable.
//!
//! cargo fuzz run fuzz_dispatch

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use smartplate::adapters::notes::MemoryNoteStore;
use smartplate::adapters::relay_heater::RelayHeater;
use smartplate::adapters::sim::SimRelayPin;
use smartplate::adapters::system::RestartLatch;
use smartplate::adapters::time::ManualClock;
use smartplate::config::ControllerConfig;
use smartplate::context::Context;
use smartplate::rpc::channels::InboundQueue;
use smartplate::rpc::dispatcher::CommandDispatcher;
use smartplate::rpc::transport::NullTransport;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let config = ControllerConfig::default();
    let heater = RelayHeater::new(
        SimRelayPin::new(),
        config.max_temperature,
        config.fault_clear_margin,
    );
    let ctx = Context::new(
        config,
        heater,
        Arc::new(InboundQueue::new()),
        Box::new(ManualClock::new(0)),
        Box::new(MemoryNoteStore::new()),
        Box::new(NullTransport),
        Box::new(RestartLatch::new()),
    );
    let mut dispatcher = CommandDispatcher::new();

    let out = dispatcher.dispatch(&ctx, 1, text);
    assert!(out.reply.is_some(), "uncontended dispatch must reply");
    assert!(ctx.store.snapshot(0).is_some());
});
