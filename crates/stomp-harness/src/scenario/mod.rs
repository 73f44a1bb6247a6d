//! Scenario testing with mandatory oracles.
//!
//! A scenario declares clients, what each one subscribes to and a script of
//! server and network events. Running it performs the full STOMP handshake
//! for every client over a [`SimTransport`](crate::SimTransport), replays the
//! script, then hands the resulting [`World`] to an oracle.
//!
//! The oracle is not optional: [`Scenario::oracle`] is the only way to get a
//! [`RunnableScenario`], so every scenario verifies its outcome.
//!
//! ```
//! use stomp_harness::scenario::{Scenario, oracle};
//!
//! let result = Scenario::new("single client")
//!     .client("alice")
//!     .subscribe("alice", "/queue/orders")
//!     .deliver("alice", "/queue/orders", "order #1")
//!     .oracle(oracle::all_of(vec![oracle::all_connected(), oracle::no_errors()]))
//!     .run();
//!
//! assert!(result.is_ok());
//! ```

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::{ActorLog, World};

/// Verification run against the final world state.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
