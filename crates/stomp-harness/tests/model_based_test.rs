//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! session behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!     ModelSession   SessionDriver     Compare
//!     (reference)    (SimTransport)    results + state
//! ```

use proptest::prelude::*;
use stomp_core::AdapterStatus;
use stomp_harness::{ModelSession, Operation, SessionDriver, init_tracing};

const HANDSHAKE: [Operation; 4] =
    [Operation::Init, Operation::Connect, Operation::Open, Operation::Connected];

/// Strategy for generating operations, weighted so sessions spend most of
/// their time connected.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let slot = any::<u8>();

    prop_oneof![
        2 => Just(Operation::Init),
        2 => Just(Operation::Connect),
        3 => Just(Operation::Open),
        3 => Just(Operation::Connected),
        6 => prop::option::weighted(0.3, 0..4u8)
            .prop_map(|custom_id| Operation::Subscribe { custom_id }),
        3 => slot.clone().prop_map(|slot| Operation::Unsubscribe { slot }),
        4 => any::<u8>().prop_map(|len| Operation::Send { len }),
        5 => slot.prop_map(|slot| Operation::Deliver { slot }),
        1 => Just(Operation::Heartbeat),
        1 => Just(Operation::Receipt),
        1 => Just(Operation::ServerError),
        1 => Just(Operation::Close),
        1 => Just(Operation::FailNextSend),
        2 => Just(Operation::Reconnect),
        1 => Just(Operation::Destroy),
        1 => any::<u16>().prop_map(|millis| Operation::AdvanceTime { millis }),
    ]
}

/// Operation sequences that start with the full handshake half of the time.
fn session_strategy() -> impl Strategy<Value = Vec<Operation>> {
    (any::<bool>(), prop::collection::vec(operation_strategy(), 0..80)).prop_map(|(prefix, ops)| {
        if prefix { HANDSHAKE.iter().copied().chain(ops).collect() } else { ops }
    })
}

proptest! {
    /// Verify that operation results and observable state match between
    /// the model and the real session after every step.
    #[test]
    fn prop_model_matches_real(ops in session_strategy()) {
        init_tracing();
        let mut model = ModelSession::new();
        let mut real = SessionDriver::new();

        for (i, op) in ops.iter().enumerate() {
            let model_result = model.apply(op);
            let real_result = real.apply(op);

            prop_assert_eq!(
                model_result,
                real_result,
                "Divergence at operation {}: {:?}",
                i, op
            );
            prop_assert_eq!(
                model.observable_state(),
                real.observable_state(),
                "State divergence after operation {}: {:?}",
                i, op
            );
        }
    }

    /// Verify session invariants hold after any operation sequence.
    #[test]
    fn prop_session_invariants(ops in session_strategy()) {
        init_tracing();
        let mut real = SessionDriver::new();

        for op in &ops {
            let _ = real.apply(op);

            let state = real.observable_state();

            // Only a connected session has ever run the connect callback.
            if state.status == AdapterStatus::Connected {
                prop_assert!(state.connects > 0);
            }

            // Destroy releases every subscription.
            if state.status == AdapterStatus::Destroyed {
                prop_assert!(state.subscriptions.is_empty());
            }

            // Generated ids always come from numbers already handed out.
            for id in &state.subscriptions {
                if let Some(seq) = id.strip_prefix("sub-") {
                    let seq: u64 = seq.parse().map_err(|e| TestCaseError::fail(format!("{e}")))?;
                    prop_assert!(seq < state.next_subscription_seq);
                }
            }
        }
    }

    /// Verify the sequence counter never moves backwards.
    #[test]
    fn prop_sequence_monotonic(ops in session_strategy()) {
        let mut model = ModelSession::new();
        let mut last = 0;

        for op in &ops {
            let _ = model.apply(op);
            let seq = model.observable_state().next_subscription_seq;

            prop_assert!(seq >= last, "sequence went from {} to {} on {:?}", last, seq, op);
            last = seq;
        }
    }

    /// Garbage from the server never breaks the session.
    #[test]
    fn prop_raw_frames_never_panic(
        ops in prop::collection::vec(operation_strategy(), 0..20),
        raw in prop::collection::vec(".{0,64}", 0..8),
    ) {
        init_tracing();
        let mut real = SessionDriver::new();
        for op in HANDSHAKE.iter().chain(&ops) {
            let _ = real.apply(op);
        }

        for text in &raw {
            let before = real.observable_state();
            let _ = real.inject_raw(text);
            let after = real.observable_state();

            // Raw text can disconnect a session but never revive one.
            if !before.status.is_live() {
                prop_assert_ne!(after.status, AdapterStatus::Connected);
            }
            prop_assert_eq!(after.next_subscription_seq, before.next_subscription_seq);
        }
    }

    /// Subscribing with the same caller id twice keeps a single entry.
    #[test]
    fn prop_custom_id_replaces(suffix in 0..4u8, repeats in 1..5usize) {
        let mut real = SessionDriver::new();
        for op in HANDSHAKE {
            prop_assert!(real.apply(&op).is_ok());
        }

        for _ in 0..repeats {
            let op = Operation::Subscribe { custom_id: Some(suffix) };
            prop_assert!(real.apply(&op).is_ok());
        }

        let state = real.observable_state();
        prop_assert_eq!(state.subscriptions.len(), 1);
        prop_assert_eq!(state.next_subscription_seq, 0);
    }
}

#[test]
fn handshake_then_traffic() {
    let mut model = ModelSession::new();
    let mut real = SessionDriver::new();

    let script = HANDSHAKE.iter().copied().chain([
        Operation::Subscribe { custom_id: None },
        Operation::Subscribe { custom_id: Some(1) },
        Operation::Deliver { slot: 0 },
        Operation::Deliver { slot: 1 },
        Operation::Send { len: 12 },
        Operation::Unsubscribe { slot: 0 },
        Operation::Close,
        Operation::Reconnect,
        Operation::Open,
        Operation::Connected,
        Operation::Subscribe { custom_id: None },
    ]);

    for op in script {
        assert_eq!(model.apply(&op), real.apply(&op), "{op:?}");
    }

    let state = real.observable_state();
    assert_eq!(state, model.observable_state());
    assert_eq!(state.status, AdapterStatus::Connected);
    assert_eq!(state.subscriptions, ["sub-1"]);
    assert_eq!(state.connects, 2);
    assert_eq!(state.errors, 1);
    assert_eq!(state.delivered, 2);
}
