//! Wire format for the STOMP text messaging protocol.
//!
//! A STOMP frame is a command line, `name:value` header lines, a blank line
//! and an optional body. This crate holds the frame model and a pure codec
//! between frames and their wire text. It has no state and does no I/O;
//! frame boundaries on the wire are the transport's business.
//!
//! # Components
//!
//! - [`header`]: ordered header sets with first-match lookup
//! - [`frame`]: the [`Frame`] model and known [`Command`]s
//! - [`codec`]: [`marshal`] / [`unmarshal`]
//! - [`errors`]: codec error types
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod errors;
pub mod frame;
pub mod header;

pub use codec::{CONTENT_LENGTH, marshal, marshal_into, unmarshal};
pub use errors::{ParseError, Result, UnknownCommand};
pub use frame::{Command, Frame};
pub use header::{Header, HeaderSet};
