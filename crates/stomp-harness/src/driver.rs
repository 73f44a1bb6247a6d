//! Real session driven by [`Operation`]s.
//!
//! Mirrors [`ModelSession`](crate::ModelSession) over an actual
//! [`Session`] on a [`SimTransport`], so model-based tests and fuzz targets
//! can replay the same operation sequence against both.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use stomp_core::{
    ProtocolViolation, Session, SessionConfig, SessionError, TransportHandler as _,
};
use stomp_proto::{Command, Frame, HeaderSet};

use crate::{
    SimEnv, SimTransport,
    model::{
        MODEL_DESTINATION, ObservableState, Operation, OperationError, OperationResult, custom_id,
        pick_subscription,
    },
};

/// Session type the harness drives.
pub type SimSession = Session<SimTransport, SimEnv>;

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    errors: AtomicUsize,
    delivered: AtomicUsize,
}

/// A session plus the counters its callbacks update.
pub struct SessionDriver {
    session: SimSession,
    env: SimEnv,
    counters: Arc<Counters>,
}

impl SessionDriver {
    /// Fresh session in `Created` over a new [`SimTransport`].
    pub fn new() -> Self {
        let env = SimEnv::new();
        let session = Session::with_config(SimTransport::new(), env.clone(), SessionConfig::default());

        Self { session, env, counters: Arc::default() }
    }

    /// Apply one operation to the real session.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match *op {
            Operation::Init => self.session.init(),
            Operation::Connect => self.connect(),
            Operation::Open => self.pump(|t| t.push_open()),
            Operation::Connected => self.pump(|t| t.push_frame("CONNECTED\nversion:1.1\n\n")),
            Operation::Subscribe { custom_id: custom } => self.subscribe(custom),
            Operation::Unsubscribe { slot } => {
                let id = self.pick(slot);
                self.session.unsubscribe(&id)
            },
            Operation::Send { len } => {
                let body = "x".repeat(usize::from(len));
                self.session.send(MODEL_DESTINATION, &HeaderSet::new(), &body)
            },
            Operation::Deliver { slot } => {
                let frame = Frame::for_command(Command::Message)
                    .header("subscription", self.pick(slot))
                    .header("message-id", "1")
                    .header("destination", MODEL_DESTINATION)
                    .body("payload");
                self.pump(|t| t.deliver(&frame))
            },
            Operation::Heartbeat => self.pump(SimTransport::push_heartbeat),
            Operation::Receipt => self.pump(|t| t.push_frame("RECEIPT\nreceipt-id:77\n\n")),
            Operation::ServerError => self.pump(|t| t.push_frame("ERROR\nmessage:boom\n\n")),
            Operation::Close => self.pump(|t| t.push_close("network drop")),
            Operation::FailNextSend => {
                self.session.transport_mut().fail_next_send("injected send failure");
                Ok(())
            },
            Operation::Reconnect => self.session.reconnect(),
            Operation::Destroy => self.session.destroy(),
            Operation::AdvanceTime { millis } => {
                self.env.advance(Duration::from_millis(u64::from(millis)));
                Ok(())
            },
        };

        match result {
            Ok(()) => OperationResult::Ok,
            Err(err) => OperationResult::Error(classify(&err)),
        }
    }

    /// Current observable state.
    pub fn observable_state(&self) -> ObservableState {
        let mut subscriptions: Vec<String> =
            self.session.subscription_ids().map(str::to_string).collect();
        subscriptions.sort();

        ObservableState {
            status: self.session.status(),
            subscriptions,
            next_subscription_seq: self.session.next_subscription_sequence(),
            connects: self.counters.connects.load(Ordering::SeqCst),
            errors: self.counters.errors.load(Ordering::SeqCst),
            delivered: self.counters.delivered.load(Ordering::SeqCst),
        }
    }

    /// The driven session.
    pub fn session(&self) -> &SimSession {
        &self.session
    }

    /// The virtual clock shared with the session.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Feed raw text straight into the session's upward message hook.
    pub fn inject_raw(&mut self, text: &str) -> Result<(), SessionError> {
        self.session.on_message(text)
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        let on_connect = Arc::clone(&self.counters);
        let on_error = Arc::clone(&self.counters);

        self.session.connect(
            &HeaderSet::new().with("login", "guest"),
            move |_, _| {
                on_connect.connects.fetch_add(1, Ordering::SeqCst);
            },
            move |_, _| {
                on_error.errors.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    fn subscribe(&mut self, custom: Option<u8>) -> Result<(), SessionError> {
        let counters = Arc::clone(&self.counters);
        let headers = custom.map(|suffix| HeaderSet::new().with("id", custom_id(suffix)));

        self.session
            .subscribe(
                MODEL_DESTINATION,
                move |_, _| {
                    counters.delivered.fetch_add(1, Ordering::SeqCst);
                },
                headers.as_ref(),
            )
            .map(|_| ())
    }

    /// Queue server-side events and run one pump. Nothing is queued when the
    /// session cannot pump, so no stale event leaks into a later pump.
    fn pump(&mut self, script: impl FnOnce(&mut SimTransport)) -> Result<(), SessionError> {
        if self.session.status().is_live() {
            script(self.session.transport_mut());
        }
        self.session.service(Duration::ZERO)
    }

    fn pick(&self, slot: u8) -> String {
        let mut ids: Vec<&str> = self.session.subscription_ids().collect();
        ids.sort_unstable();
        pick_subscription(&ids, slot).to_string()
    }
}

impl Default for SessionDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(err: &SessionError) -> OperationError {
    match err {
        SessionError::InvalidState { .. } => OperationError::InvalidState,
        SessionError::Protocol(ProtocolViolation::UnknownSubscription(_)) => {
            OperationError::UnknownSubscription
        },
        SessionError::Transport(_) | SessionError::FrameTooLarge { .. } => {
            OperationError::TransmitFailed
        },
        SessionError::Parse(_) | SessionError::Protocol(_) => OperationError::Other,
    }
}
