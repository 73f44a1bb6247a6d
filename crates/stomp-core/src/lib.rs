//! STOMP client engine
//!
//! Protocol logic for a STOMP client, decoupled from any concrete transport.
//! WebSocket, TCP or TLS bindings plug in through the adapter contract in
//! [`transport`]; the engine never performs I/O itself.
//!
//! # Architecture
//!
//! The engine is single-threaded and cooperative. Nothing happens in the
//! background: protocol progress happens inside the calls the caller makes,
//! and [`Session::service`] is the only place the transport can block and
//! the only place upward events (open, message, close) are processed.
//!
//! Time comes from an [`Environment`], so the same session runs unchanged
//! against the wall clock and against a simulated one.
//!
//! # Components
//!
//! - [`session`]: Session state machine, subscribe/send, callbacks
//! - [`subscription`]: Subscription registry keyed by id
//! - [`transport`]: Adapter contract (downward and upward capability sets)
//! - [`mod@env`]: Environment abstraction (time)
//! - [`error`]: Session, protocol and transport error types
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod session;
pub mod subscription;
pub mod transport;

pub use env::{Environment, SystemEnv};
pub use error::{ProtocolViolation, Result, SessionError, TransportError};
pub use session::{FrameCallback, SendOptions, Session, SessionConfig};
pub use stomp_proto::{Command, Frame, Header, HeaderSet};
pub use subscription::{Subscription, SubscriptionRegistry};
pub use transport::{AdapterHandle, AdapterStatus, Transport, TransportEvent, TransportHandler};
