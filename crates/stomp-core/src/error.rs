//! Error types for the STOMP engine.

use stomp_proto::ParseError;
use thiserror::Error;

use crate::transport::AdapterStatus;

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures of the session engine.
///
/// Every variant leaves the session in a well-defined state. Transport and
/// server failures move it to [`AdapterStatus::Disconnected`], from which
/// `reconnect` and `destroy` remain valid.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation not valid in the current state.
    #[error("invalid state {state:?} for operation {operation}")]
    InvalidState {
        /// State the session was in
        state: AdapterStatus,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Inbound frame text was malformed.
    #[error("malformed frame: {0}")]
    Parse(#[from] ParseError),

    /// Peer sent something the protocol does not allow here.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// A downward transport call failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Marshalled frame is larger than the transport accepts.
    #[error("frame of {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Size of the marshalled frame
        size: usize,
        /// Effective maximum
        max: usize,
    },
}

/// Protocol-level inconsistencies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// Inbound command the client does not handle.
    #[error("invalid stomp command: {0}")]
    InvalidCommand(String),

    /// Subscription id not present in the registry.
    #[error("unknown subscription: {0}")]
    UnknownSubscription(String),

    /// A required header was absent.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// RECEIPT frames are not handled yet.
    #[error("RECEIPT frames are not supported")]
    ReceiptUnsupported,
}

/// Failures reported by a transport adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Adapter was asked to do something its own state does not allow.
    #[error("transport in state {status:?} cannot {operation}")]
    InvalidState {
        /// Adapter state at the time of the call
        status: AdapterStatus,
        /// Downward operation that was attempted
        operation: &'static str,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection is gone.
    #[error("connection closed: {0}")]
    Closed(String),

    /// Adapter refused the operation for an adapter-specific reason.
    #[error("rejected: {0}")]
    Rejected(String),
}
