//! Fuzz target: `Request::parse`
//!
//! Drives arbitrary text into the envelope parser and asserts that it
//! never panics, never accepts oversized input and only yields requests
//! whose action is a string.
//!
//! cargo fuzz run fuzz_request_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use smartplate::rpc::dispatcher::Action;
use smartplate::rpc::protocol::{MAX_MESSAGE_LEN, Request};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(request) = Request::parse(text) {
        assert!(text.len() <= MAX_MESSAGE_LEN, "oversized message accepted");
        // Lookup must be total over arbitrary names.
        let _ = Action::lookup(&request.action);
        let _ = request.data_str("experiment");
    }
});
