//! STOMP frame model.
//!
//! A frame is a command line, two header sets and an optional text body. The
//! split between system and user headers only exists for outbound frames:
//! the engine fills `system_headers` with protocol headers and copies caller
//! headers into `user_headers`. Parsed frames carry everything in
//! `system_headers`.

use std::{fmt, str::FromStr};

use crate::{errors::UnknownCommand, header::HeaderSet};

/// Commands the client engine sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Server handshake acknowledgement.
    Connected,
    /// Publish a message to a destination.
    Send,
    /// Start receiving from a destination.
    Subscribe,
    /// Stop receiving for a subscription id.
    Unsubscribe,
    /// Message delivered for a subscription.
    Message,
    /// Server receipt for a client frame.
    Receipt,
    /// Server-side error; the server closes the connection after it.
    Error,
}

impl Command {
    /// Wire spelling of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "CONNECTED" => Ok(Self::Connected),
            "SEND" => Ok(Self::Send),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "ERROR" => Ok(Self::Error),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One STOMP frame, inbound or outbound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Command line, kept as text so unknown commands survive parsing.
    pub command: String,
    /// Protocol headers (outbound) or every parsed header (inbound).
    pub system_headers: HeaderSet,
    /// Caller-supplied headers, emitted after the system headers.
    pub user_headers: HeaderSet,
    /// Body text. `None` means no body at all, `Some("")` an empty one.
    pub body: Option<String>,
    /// Skip the automatic `content-length` header when marshalling.
    pub suppress_content_length: bool,
}

impl Frame {
    /// Frame with the given command and nothing else.
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), ..Self::default() }
    }

    /// Frame for a known command.
    pub fn for_command(command: Command) -> Self {
        Self::new(command.as_str())
    }

    /// Add a system header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.system_headers.push(name, value);
        self
    }

    /// Replace the user header set.
    #[must_use]
    pub fn user_headers(mut self, headers: HeaderSet) -> Self {
        self.user_headers = headers;
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Disable the automatic `content-length` header.
    #[must_use]
    pub fn without_content_length(mut self) -> Self {
        self.suppress_content_length = true;
        self
    }

    /// Parsed command, if it is one the engine knows.
    pub fn command_kind(&self) -> Result<Command, UnknownCommand> {
        self.command.parse()
    }

    /// First header named `name`, system headers before user headers.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.system_headers.get(name).or_else(|| self.user_headers.get(name))
    }

    /// Body text, or `""` when absent.
    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}
