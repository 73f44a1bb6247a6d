//! Scripted in-memory transport.
//!
//! [`SimTransport`] implements the downward adapter contract without any
//! network. Tests queue the upward events the "server" produces, pump them
//! through `Session::service`, and inspect every frame the session sent.
//!
//! The transport enforces its half of the lifecycle the way a real binding
//! would: it rejects calls that are invalid for its own state, reports
//! nothing before `init`, moves to `Connected` when it reports open and to
//! `Disconnected` when it reports an error or close.

use std::{collections::VecDeque, time::Duration};

use stomp_core::{AdapterHandle, AdapterStatus, Transport, TransportError, TransportEvent};
use stomp_proto::{Frame, ParseError, marshal, unmarshal};

use crate::faults::{FaultInjector, INJECTED_DROP};

/// Largest frame the reference WebSocket binding buffers.
pub const WEBSOCKET_MAX_FRAME: usize = 2048;

/// In-memory transport driven by a test script.
#[derive(Debug)]
pub struct SimTransport {
    status: AdapterStatus,
    parent: Option<AdapterHandle>,
    inbound: VecDeque<TransportEvent>,
    sent: Vec<String>,
    max_frame_size: Option<usize>,
    faults: Option<FaultInjector>,
    fail_next_send: Option<String>,
    fail_next_service: Option<String>,
    refuse_connect: bool,
    restarts: usize,
    services: usize,
}

impl SimTransport {
    /// Transport in `Created` with nothing queued and no size limit.
    pub fn new() -> Self {
        Self {
            status: AdapterStatus::Created,
            parent: None,
            inbound: VecDeque::new(),
            sent: Vec::new(),
            max_frame_size: None,
            faults: None,
            fail_next_send: None,
            fail_next_service: None,
            refuse_connect: false,
            restarts: 0,
            services: 0,
        }
    }

    /// Declare a maximum frame size.
    #[must_use]
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = Some(max);
        self
    }

    /// Drop the connection at random points chosen by `faults`.
    #[must_use]
    pub fn with_faults(mut self, faults: FaultInjector) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Queue an upward event for the next `service`.
    pub fn push(&mut self, event: TransportEvent) {
        self.inbound.push_back(event);
    }

    /// Queue the connection becoming live.
    pub fn push_open(&mut self) {
        self.push(TransportEvent::Open);
    }

    /// Queue raw frame text from the server.
    pub fn push_frame(&mut self, text: impl Into<String>) {
        self.push(TransportEvent::Message(text.into()));
    }

    /// Queue a frame from the server, marshalled.
    pub fn deliver(&mut self, frame: &Frame) {
        self.push_frame(marshal(frame));
    }

    /// Queue a server heartbeat.
    pub fn push_heartbeat(&mut self) {
        self.push(TransportEvent::Heartbeat);
    }

    /// Queue a transport error.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.push(TransportEvent::Error(message.into()));
    }

    /// Queue the connection closing.
    pub fn push_close(&mut self, message: impl Into<String>) {
        self.push(TransportEvent::Close(message.into()));
    }

    /// Make the next `send` fail with `reason`.
    pub fn fail_next_send(&mut self, reason: impl Into<String>) {
        self.fail_next_send = Some(reason.into());
    }

    /// Make the next `service` fail with `reason`.
    pub fn fail_next_service(&mut self, reason: impl Into<String>) {
        self.fail_next_service = Some(reason.into());
    }

    /// Make every `connect` fail.
    pub fn refuse_connect(&mut self, refuse: bool) {
        self.refuse_connect = refuse;
    }

    /// Every frame sent so far, as wire text.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Drain the sent frames.
    pub fn take_sent(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sent)
    }

    /// Sent frames, parsed back.
    pub fn sent_frames(&self) -> Result<Vec<Frame>, ParseError> {
        self.sent.iter().map(|text| unmarshal(text)).collect()
    }

    /// Command line of each sent frame.
    pub fn sent_commands(&self) -> Vec<&str> {
        self.sent.iter().map(|text| text.lines().next().unwrap_or_default()).collect()
    }

    /// Session this transport is bound to.
    pub fn parent(&self) -> Option<AdapterHandle> {
        self.parent
    }

    /// Events queued but not yet reported.
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Number of `restart` calls.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    /// Number of successful `service` calls.
    pub fn services(&self) -> usize {
        self.services
    }

    /// Fault injector, if one is installed.
    pub fn faults(&self) -> Option<&FaultInjector> {
        self.faults.as_ref()
    }

    fn invalid(&self, operation: &'static str) -> TransportError {
        TransportError::InvalidState { status: self.status, operation }
    }
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimTransport {
    fn status(&self) -> AdapterStatus {
        self.status
    }

    fn max_frame_size(&self) -> Option<usize> {
        self.max_frame_size
    }

    fn init(&mut self, parent: AdapterHandle) -> Result<(), TransportError> {
        if self.status != AdapterStatus::Created {
            return Err(self.invalid("init"));
        }

        self.parent = Some(parent);
        self.status = AdapterStatus::Initialized;
        Ok(())
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        if self.status != AdapterStatus::Initialized {
            return Err(self.invalid("connect"));
        }
        if self.refuse_connect {
            return Err(TransportError::Rejected("connection refused".to_string()));
        }

        self.status = AdapterStatus::Preconnected;
        Ok(())
    }

    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        if self.status != AdapterStatus::Connected {
            return Err(self.invalid("send"));
        }
        if let Some(reason) = self.fail_next_send.take() {
            return Err(TransportError::Closed(reason));
        }
        if let Some(max) = self.max_frame_size
            && frame.len() > max
        {
            return Err(TransportError::Rejected(format!("frame of {} bytes", frame.len())));
        }

        self.sent.push(frame.to_string());
        Ok(())
    }

    fn service(&mut self, _timeout: Duration) -> Result<Vec<TransportEvent>, TransportError> {
        if !self.status.is_live() {
            return Err(self.invalid("service"));
        }
        if let Some(reason) = self.fail_next_service.take() {
            self.status = AdapterStatus::Disconnected;
            return Err(TransportError::Closed(reason));
        }

        self.services += 1;

        let mut events = Vec::with_capacity(self.inbound.len());
        while let Some(event) = self.inbound.pop_front() {
            // Anything queued after a drop would never reach the session.
            if let Some(faults) = self.faults.as_mut()
                && faults.should_drop()
            {
                self.inbound.clear();
                self.status = AdapterStatus::Disconnected;
                events.push(TransportEvent::Close(INJECTED_DROP.to_string()));
                break;
            }

            match &event {
                TransportEvent::Open => self.status = AdapterStatus::Connected,
                TransportEvent::Error(_) | TransportEvent::Close(_) => {
                    self.status = AdapterStatus::Disconnected;
                },
                TransportEvent::Message(_) | TransportEvent::Heartbeat => {},
            }

            let stop = matches!(event, TransportEvent::Error(_) | TransportEvent::Close(_));
            events.push(event);
            if stop {
                self.inbound.clear();
                break;
            }
        }

        Ok(events)
    }

    fn restart(&mut self) -> Result<(), TransportError> {
        if self.status == AdapterStatus::Destroyed {
            return Err(self.invalid("restart"));
        }

        self.inbound.clear();
        self.restarts += 1;
        self.status = AdapterStatus::Initialized;
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), TransportError> {
        if self.status == AdapterStatus::Destroyed {
            return Err(self.invalid("destroy"));
        }

        self.inbound.clear();
        self.status = AdapterStatus::Destroyed;
        Ok(())
    }
}
