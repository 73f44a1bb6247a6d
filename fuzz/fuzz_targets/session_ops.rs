//! Session state machine under arbitrary operation sequences.
//!
//! Replays fuzzer-chosen operations against both the reference model and a
//! real session, interleaved with raw server text fed straight into the
//! session. Results and observable state must agree until the first raw
//! injection, after which only the session's own invariants are checked.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use stomp_core::AdapterStatus;
use stomp_harness::{ModelSession, Operation, SessionDriver};

#[derive(Debug, Arbitrary)]
enum Step {
    Op(Operation),
    Raw(String),
}

fuzz_target!(|steps: Vec<Step>| {
    let mut model = ModelSession::new();
    let mut real = SessionDriver::new();
    let mut in_lockstep = true;

    for step in steps.iter().take(256) {
        match step {
            Step::Op(op) => {
                let real_result = real.apply(op);
                if in_lockstep {
                    assert_eq!(model.apply(op), real_result, "{op:?}");
                    assert_eq!(model.observable_state(), real.observable_state(), "{op:?}");
                }
            },
            Step::Raw(text) => {
                let _ = real.inject_raw(text);
                in_lockstep = false;
            },
        }

        let state = real.observable_state();
        if state.status == AdapterStatus::Destroyed {
            assert!(state.subscriptions.is_empty());
        }
        if state.status == AdapterStatus::Connected {
            assert!(state.connects > 0);
        }
    }
});
