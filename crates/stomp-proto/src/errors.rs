//! Codec error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Malformed inbound frame text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input was empty, so there is no command line.
    #[error("frame has no command line")]
    MissingCommand,

    /// A header line had no `:` separator.
    #[error("header on line {line} has no ':' separator")]
    MissingSeparator {
        /// 1-based line number within the frame (the command is line 1).
        line: usize,
    },
}

/// Command text that is not part of the supported STOMP subset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown STOMP command: {0}")]
pub struct UnknownCommand(pub String);
