//! Reference model of a session.
//!
//! [`ModelSession`] is a deliberately naive description of what a session
//! should do for each [`Operation`]: plain fields, no codec, no transport.
//! Model-based tests run the same operation sequence against the model and
//! against a real session through [`SessionDriver`](crate::SessionDriver)
//! and require identical results and observable state.

use std::collections::BTreeSet;

use arbitrary::Arbitrary;
use stomp_core::AdapterStatus;

/// One step a caller, the server or the network can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Caller initializes the session.
    Init,
    /// Caller connects with a login header.
    Connect,
    /// Transport reports the connection live.
    Open,
    /// Server answers CONNECTED.
    Connected,
    /// Caller subscribes, with a caller-chosen id when `custom_id` is set.
    Subscribe {
        /// Suffix of the caller-chosen id
        custom_id: Option<u8>,
    },
    /// Caller unsubscribes the active subscription picked by `slot`.
    Unsubscribe {
        /// Index into the sorted active ids
        slot: u8,
    },
    /// Caller sends a body of `len` bytes.
    Send {
        /// Body length
        len: u8,
    },
    /// Server delivers a MESSAGE to the subscription picked by `slot`.
    Deliver {
        /// Index into the sorted active ids
        slot: u8,
    },
    /// Server heartbeat.
    Heartbeat,
    /// Server sends an unrequested RECEIPT.
    Receipt,
    /// Server sends ERROR.
    ServerError,
    /// Network closes the connection.
    Close,
    /// The next frame the transport would send fails instead.
    FailNextSend,
    /// Caller reconnects.
    Reconnect,
    /// Caller destroys the session.
    Destroy,
    /// Virtual time passes.
    AdvanceTime {
        /// Milliseconds to advance
        millis: u16,
    },
}

/// Why an operation failed, at the granularity the model can predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Not valid in the current state.
    InvalidState,
    /// Subscription id not registered.
    UnknownSubscription,
    /// The frame could not be handed to the transport.
    TransmitFailed,
    /// Anything else.
    Other,
}

/// Outcome of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,
    /// Operation failed.
    Error(OperationError),
}

impl OperationResult {
    /// Whether the operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// State both the model and a real session expose for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Session state
    pub status: AdapterStatus,
    /// Active subscription ids, sorted
    pub subscriptions: Vec<String>,
    /// Next generated subscription sequence number
    pub next_subscription_seq: u64,
    /// Connect callback invocations
    pub connects: usize,
    /// Error callback invocations
    pub errors: usize,
    /// Subscription handler invocations
    pub delivered: usize,
}

/// Destination every model subscription and send uses.
pub const MODEL_DESTINATION: &str = "/queue/model";

/// Id used when an operation targets a subscription but none is active.
pub const MISSING_SUBSCRIPTION: &str = "sub-missing";

/// Caller-chosen subscription id for `suffix`.
pub fn custom_id(suffix: u8) -> String {
    format!("custom-{suffix}")
}

/// Active id selected by `slot`, or [`MISSING_SUBSCRIPTION`] when none.
pub fn pick_subscription<'a>(sorted_ids: &[&'a str], slot: u8) -> &'a str {
    if sorted_ids.is_empty() {
        MISSING_SUBSCRIPTION
    } else {
        sorted_ids[usize::from(slot) % sorted_ids.len()]
    }
}

/// Reference model of one session and its transport.
#[derive(Debug, Clone)]
pub struct ModelSession {
    status: AdapterStatus,
    /// Whether the transport itself is open and will accept sends.
    transport_open: bool,
    /// CONNECT went out since the last connect or reconnect.
    connect_sent: bool,
    send_fault: bool,
    has_callbacks: bool,
    subscriptions: BTreeSet<String>,
    next_seq: u64,
    connects: usize,
    errors: usize,
    delivered: usize,
}

impl ModelSession {
    /// Fresh session in `Created`.
    pub fn new() -> Self {
        Self {
            status: AdapterStatus::Created,
            transport_open: false,
            connect_sent: false,
            send_fault: false,
            has_callbacks: false,
            subscriptions: BTreeSet::new(),
            next_seq: 0,
            connects: 0,
            errors: 0,
            delivered: 0,
        }
    }

    /// Apply `op` and return its predicted result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Init => self.init(),
            Operation::Connect => self.connect(),
            Operation::Subscribe { custom_id } => self.subscribe(custom_id),
            Operation::Unsubscribe { slot } => self.unsubscribe(slot),
            Operation::Send { .. } => self.send(),
            Operation::FailNextSend => {
                self.send_fault = true;
                OperationResult::Ok
            },
            Operation::Reconnect => self.reconnect(),
            Operation::Destroy => self.destroy(),
            Operation::AdvanceTime { .. } => OperationResult::Ok,
            Operation::Open
            | Operation::Connected
            | Operation::Deliver { .. }
            | Operation::Heartbeat
            | Operation::Receipt
            | Operation::ServerError
            | Operation::Close => self.service(op),
        }
    }

    /// Current observable state.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            status: self.status,
            subscriptions: self.subscriptions.iter().cloned().collect(),
            next_subscription_seq: self.next_seq,
            connects: self.connects,
            errors: self.errors,
            delivered: self.delivered,
        }
    }

    /// Session state.
    pub fn status(&self) -> AdapterStatus {
        self.status
    }

    fn init(&mut self) -> OperationResult {
        if self.status != AdapterStatus::Created {
            return OperationResult::Error(OperationError::InvalidState);
        }
        self.status = AdapterStatus::Initialized;
        OperationResult::Ok
    }

    fn connect(&mut self) -> OperationResult {
        if self.status != AdapterStatus::Initialized {
            return OperationResult::Error(OperationError::InvalidState);
        }
        self.has_callbacks = true;
        self.connect_sent = false;
        self.status = AdapterStatus::Preconnected;
        OperationResult::Ok
    }

    fn subscribe(&mut self, custom: Option<u8>) -> OperationResult {
        if self.status != AdapterStatus::Connected {
            return OperationResult::Error(OperationError::InvalidState);
        }

        let id = match custom {
            Some(suffix) => custom_id(suffix),
            None => {
                let id = format!("sub-{}", self.next_seq);
                self.next_seq += 1;
                id
            },
        };

        if !self.transmit() {
            return OperationResult::Error(OperationError::TransmitFailed);
        }

        self.subscriptions.insert(id);
        OperationResult::Ok
    }

    fn unsubscribe(&mut self, slot: u8) -> OperationResult {
        if self.status != AdapterStatus::Connected {
            return OperationResult::Error(OperationError::InvalidState);
        }

        let id = self.pick(slot);
        if !self.subscriptions.remove(&id) {
            return OperationResult::Error(OperationError::UnknownSubscription);
        }

        if self.transmit() {
            OperationResult::Ok
        } else {
            OperationResult::Error(OperationError::TransmitFailed)
        }
    }

    fn send(&mut self) -> OperationResult {
        if self.status != AdapterStatus::Connected {
            return OperationResult::Error(OperationError::InvalidState);
        }

        if self.transmit() {
            OperationResult::Ok
        } else {
            OperationResult::Error(OperationError::TransmitFailed)
        }
    }

    fn reconnect(&mut self) -> OperationResult {
        if self.status == AdapterStatus::Destroyed || !self.has_callbacks {
            return OperationResult::Error(OperationError::InvalidState);
        }

        self.subscriptions.clear();
        self.transport_open = false;
        self.connect_sent = false;
        self.status = AdapterStatus::Preconnected;
        OperationResult::Ok
    }

    fn destroy(&mut self) -> OperationResult {
        if self.status == AdapterStatus::Destroyed {
            return OperationResult::Error(OperationError::InvalidState);
        }

        self.subscriptions.clear();
        self.has_callbacks = false;
        self.transport_open = false;
        self.status = AdapterStatus::Destroyed;
        OperationResult::Ok
    }

    /// One pump delivering the event behind `op`. Event failures are
    /// swallowed by the pump, so a live session always succeeds.
    fn service(&mut self, op: &Operation) -> OperationResult {
        if !self.status.is_live() {
            return OperationResult::Error(OperationError::InvalidState);
        }

        match *op {
            Operation::Open => {
                self.transport_open = true;
                if self.status == AdapterStatus::Preconnected && !self.connect_sent {
                    if self.transmit() {
                        self.connect_sent = true;
                    } else {
                        self.fail();
                    }
                }
            },
            Operation::Connected => {
                if self.status == AdapterStatus::Preconnected {
                    self.status = AdapterStatus::Connected;
                    self.connects += 1;
                }
            },
            Operation::Deliver { slot } => {
                if self.subscriptions.contains(&self.pick(slot)) {
                    self.delivered += 1;
                }
            },
            Operation::ServerError => self.fail(),
            Operation::Close => {
                self.transport_open = false;
                self.fail();
            },
            _ => {},
        }

        OperationResult::Ok
    }

    fn fail(&mut self) {
        self.status = AdapterStatus::Disconnected;
        if self.has_callbacks {
            self.errors += 1;
        }
    }

    fn transmit(&mut self) -> bool {
        if !self.transport_open {
            return false;
        }
        if self.send_fault {
            self.send_fault = false;
            return false;
        }
        true
    }

    fn pick(&self, slot: u8) -> String {
        let ids: Vec<&str> = self.subscriptions.iter().map(String::as_str).collect();
        pick_subscription(&ids, slot).to_string()
    }
}

impl Default for ModelSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> ModelSession {
        let mut model = ModelSession::new();
        for op in [Operation::Init, Operation::Connect, Operation::Open, Operation::Connected] {
            assert!(model.apply(&op).is_ok());
        }
        model
    }

    #[test]
    fn handshake_reaches_connected() {
        let model = connected();

        assert_eq!(model.status(), AdapterStatus::Connected);
        assert_eq!(model.observable_state().connects, 1);
    }

    #[test]
    fn failed_auto_subscribe_still_consumes_sequence() {
        let mut model = connected();
        model.apply(&Operation::FailNextSend);

        let result = model.apply(&Operation::Subscribe { custom_id: None });

        assert_eq!(result, OperationResult::Error(OperationError::TransmitFailed));
        assert_eq!(model.observable_state().next_subscription_seq, 1);
        assert!(model.observable_state().subscriptions.is_empty());
    }

    #[test]
    fn reconnect_keeps_sequence() {
        let mut model = connected();
        model.apply(&Operation::Subscribe { custom_id: None });
        model.apply(&Operation::Reconnect);
        model.apply(&Operation::Open);
        model.apply(&Operation::Connected);
        model.apply(&Operation::Subscribe { custom_id: None });

        let state = model.observable_state();
        assert_eq!(state.subscriptions, ["sub-1"]);
        assert_eq!(state.connects, 2);
    }

    #[test]
    fn repeated_open_keeps_pending_send_fault() {
        let mut model = ModelSession::new();
        for op in [Operation::Init, Operation::Connect, Operation::Open, Operation::FailNextSend, Operation::Open] {
            assert!(model.apply(&op).is_ok());
        }

        assert_eq!(model.status(), AdapterStatus::Preconnected);
        assert_eq!(model.observable_state().errors, 0);

        model.apply(&Operation::Connected);
        let result = model.apply(&Operation::Subscribe { custom_id: None });
        assert_eq!(result, OperationResult::Error(OperationError::TransmitFailed));
    }

    #[test]
    fn pick_wraps_slot() {
        assert_eq!(pick_subscription(&["a", "b"], 3), "b");
        assert_eq!(pick_subscription(&[], 3), MISSING_SUBSCRIPTION);
    }
}
