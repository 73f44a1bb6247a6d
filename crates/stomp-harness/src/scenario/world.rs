//! World state for scenario execution.
//!
//! The World owns every client session, the logs their callbacks write to
//! and the shared virtual clock. Oracles read it after the script has run.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use stomp_core::{AdapterStatus, Transport as _};
use stomp_proto::{Command, Frame};

use crate::{SimEnv, driver::SimSession};

/// What one client's callbacks observed.
#[derive(Debug, Clone, Default)]
pub struct ActorLog {
    /// Connect callback invocations
    pub connects: usize,
    /// Frames passed to the error callback, in order
    pub errors: Vec<Frame>,
    /// MESSAGE frames passed to subscription handlers, in order
    pub messages: Vec<Frame>,
    /// Every `(destination, id)` subscription made, in order
    pub subscriptions: Vec<(String, String)>,
}

impl ActorLog {
    /// Most recent subscription id for `destination`.
    pub fn subscription_id(&self, destination: &str) -> Option<&str> {
        self.subscriptions
            .iter()
            .rev()
            .find(|(dest, _)| dest == destination)
            .map(|(_, id)| id.as_str())
    }

    /// Bodies of the messages received on `destination`, in order.
    pub fn bodies(&self, destination: &str) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|frame| frame.get_header("destination") == Some(destination))
            .map(Frame::body_str)
            .collect()
    }

    /// `message` header of every reported error.
    pub fn error_messages(&self) -> Vec<&str> {
        self.errors.iter().filter_map(|frame| frame.get_header("message")).collect()
    }
}

/// Shared log a client's callbacks append to.
pub(crate) type SharedLog = Arc<Mutex<ActorLog>>;

/// Lock a log, recovering it if a callback panicked while holding it.
pub(crate) fn lock(log: &Mutex<ActorLog>) -> MutexGuard<'_, ActorLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Actor {
    session: SimSession,
    log: SharedLog,
}

/// World state containing all clients.
pub struct World {
    actors: BTreeMap<String, Actor>,
    env: SimEnv,
    next_message_id: u64,
}

impl World {
    /// Empty world on the given clock.
    pub fn new(env: SimEnv) -> Self {
        Self { actors: BTreeMap::new(), env, next_message_id: 0 }
    }

    pub(crate) fn add_client(&mut self, name: String, session: SimSession, log: SharedLog) {
        self.actors.insert(name, Actor { session, log });
    }

    /// Session of client `name`.
    pub fn session(&self, name: &str) -> Option<&SimSession> {
        self.actors.get(name).map(|actor| &actor.session)
    }

    /// Session of client `name`, mutably.
    pub fn session_mut(&mut self, name: &str) -> Option<&mut SimSession> {
        self.actors.get_mut(name).map(|actor| &mut actor.session)
    }

    /// Snapshot of what client `name`'s callbacks observed.
    pub fn log(&self, name: &str) -> Option<ActorLog> {
        self.actors.get(name).map(|actor| lock(&actor.log).clone())
    }

    /// Client names, sorted.
    pub fn actor_names(&self) -> Vec<&str> {
        self.actors.keys().map(String::as_str).collect()
    }

    /// The shared virtual clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Frames client `name` has put on the wire.
    pub fn frames_sent(&self, name: &str) -> usize {
        self.session(name).map_or(0, |session| session.transport().sent().len())
    }

    /// Command of every frame client `name` has put on the wire.
    pub fn sent_commands(&self, name: &str) -> Vec<String> {
        self.session(name).map_or_else(Vec::new, |session| {
            session.transport().sent_commands().into_iter().map(str::to_string).collect()
        })
    }

    /// Whether every client is `Connected`.
    pub fn all_connected(&self) -> bool {
        self.actors.values().all(|actor| actor.session.status() == AdapterStatus::Connected)
    }

    /// Open the transport and answer CONNECTED for client `name`.
    pub(crate) fn handshake(&mut self, name: &str) -> Result<(), String> {
        let session = self.session_mut(name).ok_or_else(|| unknown(name))?;

        let transport = session.transport_mut();
        transport.push_open();
        transport.push_frame("CONNECTED\nversion:1.1\nheart-beat:0,0\n\n");

        session.service(Duration::ZERO).map_err(|e| format!("{name}: service failed: {e}"))?;

        if session.status() != AdapterStatus::Connected {
            return Err(format!("{name}: handshake ended in {:?}", session.status()));
        }
        if session.transport().status() != AdapterStatus::Connected {
            return Err(format!("{name}: transport ended in {:?}", session.transport().status()));
        }

        Ok(())
    }

    /// Deliver a MESSAGE on `destination` to client `name`'s subscription.
    pub(crate) fn deliver(&mut self, name: &str, destination: &str, body: &str) -> Result<(), String> {
        let id = self
            .log(name)
            .ok_or_else(|| unknown(name))?
            .subscription_id(destination)
            .map(str::to_string)
            .ok_or_else(|| format!("{name}: no subscription for {destination}"))?;

        let message_id = self.next_message_id;
        self.next_message_id += 1;

        let frame = Frame::for_command(Command::Message)
            .header("subscription", id)
            .header("message-id", message_id.to_string())
            .header("destination", destination)
            .body(body);

        self.pump(name, |transport| transport.deliver(&frame))
    }

    /// Queue events on client `name`'s transport and pump once.
    pub(crate) fn pump(
        &mut self,
        name: &str,
        script: impl FnOnce(&mut crate::SimTransport),
    ) -> Result<(), String> {
        let session = self.session_mut(name).ok_or_else(|| unknown(name))?;

        script(session.transport_mut());
        session.service(Duration::ZERO).map_err(|e| format!("{name}: service failed: {e}"))
    }

    /// Reconnect client `name` and repeat the handshake.
    pub(crate) fn reconnect(&mut self, name: &str) -> Result<(), String> {
        let session = self.session_mut(name).ok_or_else(|| unknown(name))?;
        session.reconnect().map_err(|e| format!("{name}: reconnect failed: {e}"))?;

        self.handshake(name)
    }
}

fn unknown(name: &str) -> String {
    format!("unknown client {name}")
}
