//! Adapter contract between the engine and a byte-stream transport.
//!
//! The contract has two halves:
//!
//! - [`Transport`] is the downward set the engine calls: init, connect, send,
//!   service, restart, destroy. WebSocket, TCP or TLS bindings implement it.
//! - [`TransportHandler`] is the upward set the transport reports into:
//!   open, message, error, heartbeat, close. The session implements it.
//!
//! # Re-entrancy
//!
//! Upward events only happen inside [`Transport::service`]. Instead of
//! holding a pointer back to the session, the transport returns the events it
//! observed during the pump, in order, and the session feeds each one to its
//! own [`TransportHandler`] before `service` returns to the caller. Callbacks
//! still fire synchronously on the caller's thread and in transport order,
//! and the session stays the sole owner of the transport.
//!
//! The transport only keeps an [`AdapterHandle`], a plain index naming the
//! session it is bound to.
//!
//! # Lifecycle
//!
//! ```text
//! ┌─────────┐ init ┌─────────────┐ connect ┌──────────────┐ open ┌───────────┐
//! │ Created │─────>│ Initialized │────────>│ Preconnected │─────>│ Connected │
//! └─────────┘      └─────────────┘         └──────────────┘      └───────────┘
//!                        ↑                        │ close/error        │
//!                        │ restart                ↓                    │
//!                        │                 ┌──────────────┐            │
//!                        └─────────────────│ Disconnected │<───────────┘
//!                                          └──────────────┘
//!            destroy from any state except Destroyed ──> Destroyed
//! ```

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use crate::error::{Result, TransportError};

/// Lifecycle state shared by the session and its transport.
///
/// Each side tracks its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterStatus {
    /// Built, nothing bound yet.
    Created,
    /// Bound to its counterpart, ready to connect.
    Initialized,
    /// Connection requested, handshake not finished.
    Preconnected,
    /// Transport open (transport side) or CONNECTED received (session side).
    Connected,
    /// Lost the connection or the server reported an error.
    Disconnected,
    /// Torn down for good.
    Destroyed,
}

impl AdapterStatus {
    /// States in which I/O can be pumped.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Preconnected | Self::Connected)
    }
}

/// Non-owning reference from a transport back to the session it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdapterHandle(u64);

impl AdapterHandle {
    /// Allocate a process-unique handle.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Handle with a fixed value, for transports driven outside a session.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value, for logging.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AdapterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adapter-{}", self.0)
    }
}

/// Upward event observed by a transport while servicing I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The underlying connection is live.
    Open,
    /// One complete inbound frame, terminator already stripped.
    Message(String),
    /// Transport-level failure.
    Error(String),
    /// Peer heartbeat.
    Heartbeat,
    /// Connection closed by the peer or the network.
    Close(String),
}

/// Downward capability set: what the engine asks of a transport.
///
/// Implementations track their own [`AdapterStatus`] and must reject calls
/// that are invalid for it with [`TransportError::InvalidState`]:
///
/// | Method | Valid from | Moves to |
/// |---|---|---|
/// | `init` | Created | Initialized |
/// | `connect` | Initialized | Preconnected |
/// | `send` | Connected | - |
/// | `service` | Preconnected, Connected | - |
/// | `restart` | anything but Destroyed | Initialized |
/// | `destroy` | anything but Destroyed | Destroyed |
///
/// A transport reports no events before `init` has completed, and each
/// [`TransportEvent::Message`] carries exactly one whole frame; reassembly of
/// partial reads happens below this interface.
pub trait Transport {
    /// Current adapter state.
    fn status(&self) -> AdapterStatus;

    /// Largest frame, in bytes, the transport will accept in one `send`.
    fn max_frame_size(&self) -> Option<usize> {
        None
    }

    /// Bind the transport to the session identified by `parent`.
    fn init(&mut self, parent: AdapterHandle) -> std::result::Result<(), TransportError>;

    /// Start establishing the connection. Completion is reported later as
    /// [`TransportEvent::Open`].
    fn connect(&mut self) -> std::result::Result<(), TransportError>;

    /// Transmit one marshalled frame.
    fn send(&mut self, frame: &str) -> std::result::Result<(), TransportError>;

    /// Pump pending I/O for up to `timeout`, returning the upward events seen.
    fn service(&mut self, timeout: Duration)
    -> std::result::Result<Vec<TransportEvent>, TransportError>;

    /// Release connection resources and return to `Initialized`, keeping the
    /// binding to the session.
    fn restart(&mut self) -> std::result::Result<(), TransportError>;

    /// Release everything and move to `Destroyed`.
    fn destroy(&mut self) -> std::result::Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn status(&self) -> AdapterStatus {
        (**self).status()
    }

    fn max_frame_size(&self) -> Option<usize> {
        (**self).max_frame_size()
    }

    fn init(&mut self, parent: AdapterHandle) -> std::result::Result<(), TransportError> {
        (**self).init(parent)
    }

    fn connect(&mut self) -> std::result::Result<(), TransportError> {
        (**self).connect()
    }

    fn send(&mut self, frame: &str) -> std::result::Result<(), TransportError> {
        (**self).send(frame)
    }

    fn service(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Vec<TransportEvent>, TransportError> {
        (**self).service(timeout)
    }

    fn restart(&mut self) -> std::result::Result<(), TransportError> {
        (**self).restart()
    }

    fn destroy(&mut self) -> std::result::Result<(), TransportError> {
        (**self).destroy()
    }
}

/// Upward capability set: how a transport reports into the engine.
pub trait TransportHandler {
    /// Connection is live.
    fn on_open(&mut self) -> Result<()>;

    /// One complete inbound frame arrived.
    fn on_message(&mut self, text: &str) -> Result<()>;

    /// Transport-level failure.
    fn on_error(&mut self, message: &str) -> Result<()>;

    /// Peer heartbeat.
    fn on_heartbeat(&mut self) -> Result<()>;

    /// Connection closed.
    fn on_close(&mut self, message: &str) -> Result<()>;

    /// Route an event to the matching callback.
    fn handle_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Error(message) => self.on_error(&message),
            TransportEvent::Heartbeat => self.on_heartbeat(),
            TransportEvent::Close(message) => self.on_close(&message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let a = AdapterHandle::next();
        let b = AdapterHandle::next();

        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn live_states() {
        assert!(AdapterStatus::Preconnected.is_live());
        assert!(AdapterStatus::Connected.is_live());
        assert!(!AdapterStatus::Initialized.is_live());
        assert!(!AdapterStatus::Disconnected.is_live());
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
    }

    impl TransportHandler for Recorder {
        fn on_open(&mut self) -> Result<()> {
            self.seen.push("open".into());
            Ok(())
        }

        fn on_message(&mut self, text: &str) -> Result<()> {
            self.seen.push(format!("message {text}"));
            Ok(())
        }

        fn on_error(&mut self, message: &str) -> Result<()> {
            self.seen.push(format!("error {message}"));
            Ok(())
        }

        fn on_heartbeat(&mut self) -> Result<()> {
            self.seen.push("heartbeat".into());
            Ok(())
        }

        fn on_close(&mut self, message: &str) -> Result<()> {
            self.seen.push(format!("close {message}"));
            Ok(())
        }
    }

    #[test]
    fn handle_event_routes_each_variant() {
        let mut recorder = Recorder::default();

        for event in [
            TransportEvent::Open,
            TransportEvent::Message("CONNECTED\n\n".into()),
            TransportEvent::Heartbeat,
            TransportEvent::Error("boom".into()),
            TransportEvent::Close("bye".into()),
        ] {
            recorder.handle_event(event).unwrap();
        }

        assert_eq!(
            recorder.seen,
            ["open", "message CONNECTED\n\n", "heartbeat", "error boom", "close bye"]
        );
    }
}
