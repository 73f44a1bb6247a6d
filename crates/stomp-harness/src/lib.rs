//! Deterministic simulation harness for STOMP client testing.
//!
//! In-memory implementations of the Transport and Environment traits, a
//! reference model of the session, and a scenario framework, for
//! reproducible tests without a network or a broker.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
pub mod faults;
pub mod model;
pub mod scenario;
pub mod sim_env;
pub mod sim_transport;
pub mod telemetry;

pub use driver::{SessionDriver, SimSession};
pub use faults::{FaultInjector, INJECTED_DROP};
pub use model::{ModelSession, ObservableState, Operation, OperationError, OperationResult};
pub use sim_env::SimEnv;
pub use sim_transport::{SimTransport, WEBSOCKET_MAX_FRAME};
pub use telemetry::init_tracing;
