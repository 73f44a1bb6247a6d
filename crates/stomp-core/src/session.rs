//! STOMP session: the client engine.
//!
//! A [`Session`] owns one transport and drives the connection lifecycle over
//! it. It composes the codec, the subscription registry and the adapter
//! contract, and holds the caller's connect and error callbacks.
//!
//! # State Machine
//!
//! | Operation | Valid from | Result state |
//! |---|---|---|
//! | [`Session::init`] | Created | Initialized |
//! | [`Session::connect`] | Initialized | Preconnected |
//! | transport open | Preconnected | Preconnected, CONNECT sent once per cycle |
//! | inbound CONNECTED | Preconnected | Connected |
//! | inbound ERROR | any after init | Disconnected |
//! | transport error / close | any after init | Disconnected |
//! | [`Session::reconnect`] | not Destroyed | Preconnected |
//! | [`Session::destroy`] | not Destroyed | Destroyed |
//!
//! [`Session::subscribe`], [`Session::unsubscribe`] and [`Session::send`]
//! require `Connected`, so CONNECT always goes out before any SUBSCRIBE or
//! SEND. The guard enforces the ordering, not timing.
//!
//! # Callbacks
//!
//! Every callback runs synchronously inside the call that triggered it,
//! usually [`Session::service`], and receives `&mut Session`. A connect
//! callback can therefore subscribe, and a message handler can unsubscribe
//! itself. Callbacks are cloned out of the session before they are invoked,
//! so this re-entrancy never aliases session state.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use stomp_proto::{Command, Frame, HeaderSet, marshal, unmarshal};

use crate::{
    env::{Environment, SystemEnv},
    error::{ProtocolViolation, Result, SessionError},
    subscription::{Subscription, SubscriptionRegistry},
    transport::{AdapterHandle, AdapterStatus, Transport, TransportHandler},
};

/// Callback invoked with the session and a frame.
///
/// Used for the connect callback, the error callback and subscription
/// handlers.
pub type FrameCallback<T, E = SystemEnv> = Arc<dyn Fn(&mut Session<T, E>, &Frame) + Send + Sync>;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Value of the `accept-version` header on CONNECT.
    pub accept_version: String,
    /// Client and server heartbeat intervals in milliseconds, sent as the
    /// `heart-beat` header on CONNECT.
    pub heart_beat: (u32, u32),
    /// Prefix for generated subscription ids.
    pub subscription_id_prefix: String,
    /// Engine-side cap on a marshalled frame, in bytes. The transport's own
    /// limit applies as well; the smaller one wins.
    pub max_frame_size: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            accept_version: "1.1,1.0".to_string(),
            heart_beat: (10_000, 10_000),
            subscription_id_prefix: "sub-".to_string(),
            max_frame_size: None,
        }
    }
}

/// Options for [`Session::send_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Emit a `content-length` header for the body.
    pub content_length: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self { content_length: true }
    }
}

/// STOMP client session over a transport `T`.
pub struct Session<T, E = SystemEnv> {
    handle: AdapterHandle,
    status: AdapterStatus,
    transport: T,
    env: E,
    config: SessionConfig,
    /// Headers given to `connect`, replayed on every CONNECT.
    connect_headers: HeaderSet,
    connect_callback: Option<FrameCallback<T, E>>,
    error_callback: Option<FrameCallback<T, E>>,
    subscriptions: SubscriptionRegistry<FrameCallback<T, E>>,
    /// Never reset, so generated ids are unique for the session's lifetime.
    next_subscription_seq: u64,
    /// CONNECT already went out in the current connect cycle.
    connect_sent: bool,
    /// Unused by the engine; kept for heartbeat supervision by callers.
    last_server_activity: Instant,
}

impl<T: Transport> Session<T> {
    /// Wrap `transport` with the default configuration and the system clock.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SystemEnv, SessionConfig::default())
    }
}

impl<T: Transport, E: Environment> Session<T, E> {
    /// Wrap `transport` with an explicit environment and configuration.
    pub fn with_config(transport: T, env: E, config: SessionConfig) -> Self {
        let last_server_activity = env.now();

        Self {
            handle: AdapterHandle::next(),
            status: AdapterStatus::Created,
            transport,
            env,
            config,
            connect_headers: HeaderSet::new(),
            connect_callback: None,
            error_callback: None,
            subscriptions: SubscriptionRegistry::new(),
            next_subscription_seq: 0,
            connect_sent: false,
            last_server_activity,
        }
    }

    /// Bind the transport to this session.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is `Created`
    /// - `Transport` if the transport refuses to initialize
    pub fn init(&mut self) -> Result<()> {
        self.require(AdapterStatus::Created, "init")?;

        self.transport.init(self.handle)?;
        self.transition(AdapterStatus::Initialized);

        Ok(())
    }

    /// Start connecting.
    ///
    /// `headers` are copied and sent with every CONNECT, including the ones
    /// issued by [`Session::reconnect`]. `on_connect` runs when the server
    /// answers CONNECTED; `on_error` runs on ERROR frames and transport
    /// failures.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is `Initialized`
    /// - `Transport` if the transport cannot start connecting; the session
    ///   is then `Disconnected`
    pub fn connect<C, F>(&mut self, headers: &HeaderSet, on_connect: C, on_error: F) -> Result<()>
    where
        C: Fn(&mut Self, &Frame) + Send + Sync + 'static,
        F: Fn(&mut Self, &Frame) + Send + Sync + 'static,
    {
        self.require(AdapterStatus::Initialized, "connect")?;

        self.connect_headers = headers.clone();
        self.connect_callback = Some(Arc::new(on_connect));
        self.error_callback = Some(Arc::new(on_error));

        self.start_connect()
    }

    /// Subscribe to `destination`, returning the subscription id.
    ///
    /// An `id` in `headers` is used verbatim and the caller owns its
    /// uniqueness. Otherwise the id is generated from the configured prefix
    /// and a sequence that never repeats within this session. The handler is
    /// registered only once the SUBSCRIBE frame has been sent. A generated
    /// id is consumed even when sending fails, so the next subscribe gets a
    /// fresh one.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is `Connected`
    /// - `FrameTooLarge` or `Transport` if SUBSCRIBE could not be sent
    pub fn subscribe<H>(
        &mut self,
        destination: &str,
        handler: H,
        headers: Option<&HeaderSet>,
    ) -> Result<String>
    where
        H: Fn(&mut Self, &Frame) + Send + Sync + 'static,
    {
        self.require(AdapterStatus::Connected, "subscribe")?;

        let user_headers = headers.cloned().unwrap_or_default();
        let mut frame = Frame::for_command(Command::Subscribe).header("destination", destination);

        let id = if let Some(id) = user_headers.get("id") {
            id.to_string()
        } else {
            let id = format!("{}{}", self.config.subscription_id_prefix, self.next_subscription_seq);
            self.next_subscription_seq += 1;
            frame.system_headers.push("id", id.as_str());
            id
        };

        frame.user_headers = user_headers;
        self.transmit(&frame)?;

        let handler: FrameCallback<T, E> = Arc::new(handler);
        if self.subscriptions.insert(Subscription::new(id.as_str(), destination, handler)).is_some() {
            tracing::warn!(id = %id, "subscription id reused, previous handler replaced");
        }

        Ok(id)
    }

    /// Cancel subscription `id`.
    ///
    /// The subscription is detached before UNSUBSCRIBE is sent, so it stays
    /// detached even if sending fails.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is `Connected`
    /// - `Protocol(UnknownSubscription)` if `id` is not registered
    /// - `FrameTooLarge` or `Transport` if UNSUBSCRIBE could not be sent
    pub fn unsubscribe(&mut self, id: &str) -> Result<()> {
        self.require(AdapterStatus::Connected, "unsubscribe")?;

        if self.subscriptions.remove(id).is_none() {
            return Err(ProtocolViolation::UnknownSubscription(id.to_string()).into());
        }

        let frame = Frame::for_command(Command::Unsubscribe).header("id", id);
        self.transmit(&frame)
    }

    /// Send `body` to `destination` with a `content-length` header.
    ///
    /// A `content-length:false` entry in `headers` still suppresses the
    /// length header, for callers of the older API.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is `Connected`
    /// - `FrameTooLarge` or `Transport` if SEND could not be sent
    pub fn send(&mut self, destination: &str, headers: &HeaderSet, body: &str) -> Result<()> {
        self.send_with(destination, headers, body, SendOptions::default())
    }

    /// Send `body` to `destination` with explicit options.
    ///
    /// # Errors
    ///
    /// Same as [`Session::send`].
    pub fn send_with(
        &mut self,
        destination: &str,
        headers: &HeaderSet,
        body: &str,
        options: SendOptions,
    ) -> Result<()> {
        self.require(AdapterStatus::Connected, "send")?;

        let mut frame = Frame::for_command(Command::Send)
            .header("destination", destination)
            .user_headers(headers.clone())
            .body(body);
        frame.suppress_content_length = !options.content_length;

        self.transmit(&frame)
    }

    /// Let the transport pump I/O for up to `timeout`.
    ///
    /// Every upward event the transport reports is handled before this
    /// returns, in the order reported, so callbacks fire inside this call.
    /// A failing event is logged and does not stop the remaining ones.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is `Preconnected` or `Connected`
    /// - `Transport` if the transport's own service fails; the session is
    ///   then `Disconnected` and the error callback has run
    pub fn service(&mut self, timeout: Duration) -> Result<()> {
        if !self.status.is_live() {
            return Err(self.invalid_state("service"));
        }

        let events = match self.transport.service(timeout) {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(error = %err, "transport service failed");
                self.fail_with(&error_frame(&err.to_string()));
                return Err(err.into());
            },
        };

        for event in events {
            if let Err(err) = self.handle_event(event) {
                tracing::warn!(handle = %self.handle, error = %err, "transport event failed");
            }
        }

        Ok(())
    }

    /// Tear the connection down and connect again.
    ///
    /// Drops every subscription, restarts the transport and reissues
    /// `connect` with the original headers and callbacks. Subscriptions must
    /// be recreated, typically from the connect callback. The subscription id
    /// sequence carries on where it left off.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the session is `Destroyed` or was never connected
    /// - `Transport` if restarting or connecting the transport fails; the
    ///   session is then `Disconnected` and `reconnect` may be retried
    pub fn reconnect(&mut self) -> Result<()> {
        if self.status == AdapterStatus::Destroyed || self.connect_callback.is_none() {
            return Err(self.invalid_state("reconnect"));
        }

        let dropped = self.subscriptions.clear();
        tracing::info!(handle = %self.handle, dropped, "reconnecting");

        if let Err(err) = self.transport.restart() {
            tracing::warn!(handle = %self.handle, error = %err, "transport restart failed");
            self.transition(AdapterStatus::Disconnected);
            return Err(err.into());
        }
        self.transition(AdapterStatus::Initialized);

        self.start_connect()
    }

    /// Release everything and destroy the transport.
    ///
    /// The session is `Destroyed` afterwards even if the transport reports a
    /// failure while tearing down.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if already `Destroyed`
    /// - `Transport` if the transport failed to tear down
    pub fn destroy(&mut self) -> Result<()> {
        if self.status == AdapterStatus::Destroyed {
            return Err(self.invalid_state("destroy"));
        }

        self.subscriptions.clear();
        self.connect_headers = HeaderSet::new();
        self.connect_callback = None;
        self.error_callback = None;

        let result = self.transport.destroy();
        self.transition(AdapterStatus::Destroyed);

        result.map_err(SessionError::from)
    }

    /// Current state.
    pub fn status(&self) -> AdapterStatus {
        self.status
    }

    /// Handle naming this session to its transport.
    pub fn handle(&self) -> AdapterHandle {
        self.handle
    }

    /// Configuration in use.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether subscription `id` is active.
    pub fn has_subscription(&self, id: &str) -> bool {
        self.subscriptions.contains(id)
    }

    /// Ids of the active subscriptions, in no particular order.
    pub fn subscription_ids(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.ids()
    }

    /// Sequence number the next generated subscription id will use.
    pub fn next_subscription_sequence(&self) -> u64 {
        self.next_subscription_seq
    }

    /// Headers stored by the last `connect`.
    pub fn connect_headers(&self) -> &HeaderSet {
        &self.connect_headers
    }

    /// When the server was last heard from.
    pub fn last_server_activity(&self) -> Instant {
        self.last_server_activity
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The wrapped transport, mutably.
    ///
    /// Driving the transport's lifecycle directly bypasses the session's
    /// state tracking.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn start_connect(&mut self) -> Result<()> {
        self.connect_sent = false;

        if let Err(err) = self.transport.connect() {
            self.transition(AdapterStatus::Disconnected);
            return Err(err.into());
        }

        self.transition(AdapterStatus::Preconnected);
        Ok(())
    }

    fn send_connect(&mut self) -> Result<()> {
        let (cx, cy) = self.config.heart_beat;
        let frame = Frame::for_command(Command::Connect)
            .header("accept-version", self.config.accept_version.as_str())
            .header("heart-beat", format!("{cx},{cy}"))
            .user_headers(self.connect_headers.clone());

        self.transmit(&frame)?;
        self.connect_sent = true;
        Ok(())
    }

    /// Marshal and hand one frame to the transport.
    fn transmit(&mut self, frame: &Frame) -> Result<()> {
        let text = marshal(frame);

        if let Some(max) = self.frame_limit()
            && text.len() > max
        {
            return Err(SessionError::FrameTooLarge { size: text.len(), max });
        }

        tracing::debug!(command = %frame.command, len = text.len(), "sending frame");
        tracing::trace!(text = %text, "frame text");

        self.transport.send(&text)?;
        Ok(())
    }

    fn frame_limit(&self) -> Option<usize> {
        match (self.config.max_frame_size, self.transport.max_frame_size()) {
            (Some(engine), Some(transport)) => Some(engine.min(transport)),
            (engine, transport) => engine.or(transport),
        }
    }

    fn on_connected(&mut self, frame: &Frame) -> Result<()> {
        self.require(AdapterStatus::Preconnected, "connected")?;

        self.transition(AdapterStatus::Connected);

        if let Some(callback) = self.connect_callback.clone() {
            callback(self, frame);
        }

        Ok(())
    }

    fn dispatch(&mut self, frame: &Frame) -> Result<()> {
        let id = frame
            .get_header("subscription")
            .ok_or(ProtocolViolation::MissingHeader("subscription"))?;

        let Some(handler) = self.subscriptions.get(id).map(|sub| Arc::clone(sub.handler())) else {
            tracing::warn!(subscription = %id, "dropping message for unknown subscription");
            return Err(ProtocolViolation::UnknownSubscription(id.to_string()).into());
        };

        handler(self, frame);
        Ok(())
    }

    /// Mark the session disconnected and report `frame` to the caller.
    fn fail_with(&mut self, frame: &Frame) {
        self.transition(AdapterStatus::Disconnected);

        if let Some(callback) = self.error_callback.clone() {
            callback(self, frame);
        }
    }

    /// Upward events are meaningless before init and after destroy.
    fn require_bound(&self, operation: &'static str) -> Result<()> {
        match self.status {
            AdapterStatus::Created | AdapterStatus::Destroyed => Err(self.invalid_state(operation)),
            _ => Ok(()),
        }
    }

    fn require(&self, expected: AdapterStatus, operation: &'static str) -> Result<()> {
        if self.status == expected { Ok(()) } else { Err(self.invalid_state(operation)) }
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState { state: self.status, operation }
    }

    fn transition(&mut self, to: AdapterStatus) {
        if self.status != to {
            tracing::info!(handle = %self.handle, from = ?self.status, to = ?to, "session state");
            self.status = to;
        }
    }
}

impl<T: Transport, E: Environment> TransportHandler for Session<T, E> {
    fn on_open(&mut self) -> Result<()> {
        self.require(AdapterStatus::Preconnected, "open")?;

        // One CONNECT per connect cycle, however often the transport reports open.
        if self.connect_sent {
            tracing::debug!(handle = %self.handle, "transport open repeated, CONNECT already sent");
            return Ok(());
        }

        if let Err(err) = self.send_connect() {
            self.fail_with(&error_frame(&err.to_string()));
            return Err(err);
        }

        Ok(())
    }

    fn on_message(&mut self, text: &str) -> Result<()> {
        self.require_bound("message")?;
        self.last_server_activity = self.env.now();

        let frame = unmarshal(text)?;
        tracing::debug!(command = %frame.command, len = text.len(), "received frame");
        tracing::trace!(text = %text, "frame text");

        match frame.command_kind() {
            Ok(Command::Connected) => self.on_connected(&frame),
            Ok(Command::Message) => self.dispatch(&frame),
            Ok(Command::Error) => {
                self.fail_with(&frame);
                Ok(())
            },
            Ok(Command::Receipt) => {
                // Receipts are never requested, so one arriving is unexpected.
                tracing::warn!(receipt = ?frame.get_header("receipt-id"), "RECEIPT not supported");
                Err(ProtocolViolation::ReceiptUnsupported.into())
            },
            Ok(_) | Err(_) => {
                tracing::warn!(command = %frame.command, "invalid stomp command");
                self.fail_with(&error_frame("invalid stomp command"));
                Err(ProtocolViolation::InvalidCommand(frame.command).into())
            },
        }
    }

    fn on_error(&mut self, message: &str) -> Result<()> {
        self.require_bound("error")?;
        tracing::warn!(handle = %self.handle, reason = message, "transport error");

        self.fail_with(&error_frame(message));
        Ok(())
    }

    fn on_heartbeat(&mut self) -> Result<()> {
        self.require_bound("heartbeat")?;
        tracing::trace!(handle = %self.handle, "heartbeat");

        self.last_server_activity = self.env.now();
        Ok(())
    }

    fn on_close(&mut self, message: &str) -> Result<()> {
        self.require_bound("close")?;
        tracing::info!(handle = %self.handle, reason = message, "transport closed");

        self.fail_with(&error_frame(message));
        Ok(())
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Session<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("status", &self.status)
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("connect_headers", &self.connect_headers)
            .field("subscriptions", &self.subscriptions.len())
            .field("next_subscription_seq", &self.next_subscription_seq)
            .finish_non_exhaustive()
    }
}

/// ERROR frame carrying `message`, as reported for transport failures.
fn error_frame(message: &str) -> Frame {
    Frame::for_command(Command::Error).header("message", message)
}
