//! Frame parser robustness.
//!
//! Any text must parse or fail cleanly, and a parsed frame must survive a
//! marshal/unmarshal cycle with its command and headers intact.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stomp_proto::{marshal, unmarshal};

fuzz_target!(|text: &str| {
    let Ok(frame) = unmarshal(text) else {
        return;
    };

    // Bodies may hold anything; only the framing has to round-trip.
    let Ok(again) = unmarshal(&marshal(&frame.clone().without_content_length())) else {
        panic!("marshalled frame failed to parse: {frame:?}");
    };

    assert_eq!(again.command, frame.command);
    assert_eq!(again.body, frame.body.or_else(|| Some(String::new())));
});
