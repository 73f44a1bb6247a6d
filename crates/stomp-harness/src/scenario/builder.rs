//! Scenario builder.
//!
//! Clients and the server-side script are declared up front; nothing runs
//! until an oracle has been attached.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use stomp_core::{Session, SessionConfig};
use stomp_proto::{Frame, HeaderSet};

use crate::{
    SimEnv, SimTransport,
    driver::SimSession,
    scenario::{
        OracleFn, World,
        world::{ActorLog, SharedLog, lock},
    },
};

/// One scripted event, applied after every client has connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Server delivers `body` on the client's subscription to `destination`.
    Deliver {
        /// Receiving client
        client: String,
        /// Subscribed destination
        destination: String,
        /// Message body
        body: String,
    },
    /// Server heartbeat.
    Heartbeat {
        /// Receiving client
        client: String,
    },
    /// Server sends ERROR with `message`.
    ServerError {
        /// Receiving client
        client: String,
        /// Value of the `message` header
        message: String,
    },
    /// Network closes the client's connection.
    Drop {
        /// Affected client
        client: String,
        /// Close reason
        reason: String,
    },
    /// Client reconnects and completes the handshake again.
    Reconnect {
        /// Reconnecting client
        client: String,
    },
    /// Virtual time passes.
    AdvanceTime(Duration),
}

struct ClientPlan {
    name: String,
    config: SessionConfig,
    headers: HeaderSet,
    destinations: Vec<String>,
}

/// Scenario builder.
///
/// Declare clients and a script of events. Must call `.oracle()` to get a
/// [`RunnableScenario`] that can be executed.
pub struct Scenario {
    name: String,
    clients: Vec<ClientPlan>,
    steps: Vec<Step>,
    problems: Vec<String>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), clients: Vec::new(), steps: Vec::new(), problems: Vec::new() }
    }

    /// Add a client with default configuration.
    #[must_use]
    pub fn client(self, name: impl Into<String>) -> Self {
        self.client_with_config(name, SessionConfig::default())
    }

    /// Add a client with custom configuration.
    #[must_use]
    pub fn client_with_config(mut self, name: impl Into<String>, config: SessionConfig) -> Self {
        self.clients.push(ClientPlan {
            name: name.into(),
            config,
            headers: HeaderSet::new(),
            destinations: Vec::new(),
        });
        self
    }

    /// Add a header to `client`'s CONNECT frame.
    #[must_use]
    pub fn connect_header(
        mut self,
        client: &str,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        match self.plan_mut(client) {
            Some(plan) => plan.headers.push(name, value),
            None => self.problems.push(format!("connect_header for unknown client {client}")),
        }
        self
    }

    /// Have `client` subscribe to `destination` from its connect callback,
    /// so the subscription is renewed on every reconnect.
    #[must_use]
    pub fn subscribe(mut self, client: &str, destination: impl Into<String>) -> Self {
        match self.plan_mut(client) {
            Some(plan) => plan.destinations.push(destination.into()),
            None => self.problems.push(format!("subscribe for unknown client {client}")),
        }
        self
    }

    /// Script a MESSAGE delivery.
    #[must_use]
    pub fn deliver(
        self,
        client: impl Into<String>,
        destination: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        self.step(Step::Deliver {
            client: client.into(),
            destination: destination.into(),
            body: body.into(),
        })
    }

    /// Script a server heartbeat.
    #[must_use]
    pub fn heartbeat(self, client: impl Into<String>) -> Self {
        self.step(Step::Heartbeat { client: client.into() })
    }

    /// Script a server ERROR frame.
    #[must_use]
    pub fn server_error(self, client: impl Into<String>, message: impl Into<String>) -> Self {
        self.step(Step::ServerError { client: client.into(), message: message.into() })
    }

    /// Script the network dropping the connection.
    #[must_use]
    pub fn drop_connection(self, client: impl Into<String>, reason: impl Into<String>) -> Self {
        self.step(Step::Drop { client: client.into(), reason: reason.into() })
    }

    /// Script a reconnect.
    #[must_use]
    pub fn reconnect(self, client: impl Into<String>) -> Self {
        self.step(Step::Reconnect { client: client.into() })
    }

    /// Script virtual time passing.
    #[must_use]
    pub fn advance_time(self, by: Duration) -> Self {
        self.step(Step::AdvanceTime(by))
    }

    /// Append any step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }

    fn plan_mut(&mut self, client: &str) -> Option<&mut ClientPlan> {
        self.clients.iter_mut().find(|plan| plan.name == client)
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Every client is created, initialized, connected and taken through the
    /// handshake (open, CONNECT, CONNECTED). Connect callbacks subscribe to
    /// the declared destinations. The script then runs in order and the
    /// oracle verifies the final world.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, clients, steps, problems } = self.scenario;

        if let Some(problem) = problems.first() {
            return Err(format!("Scenario '{name}': {problem}"));
        }

        let env = SimEnv::new();
        let mut world = World::new(env.clone());

        for plan in clients {
            let log: SharedLog = Arc::new(Mutex::new(ActorLog::default()));
            let mut session =
                Session::with_config(SimTransport::new(), env.clone(), plan.config);

            session.init().map_err(|e| format!("Scenario '{name}': {} init failed: {e}", plan.name))?;
            session
                .connect(
                    &plan.headers,
                    subscribe_on_connect(Arc::clone(&log), plan.destinations),
                    record_errors(Arc::clone(&log)),
                )
                .map_err(|e| format!("Scenario '{name}': {} connect failed: {e}", plan.name))?;

            world.add_client(plan.name.clone(), session, log);
            world.handshake(&plan.name).map_err(|e| format!("Scenario '{name}': {e}"))?;
        }

        for step in steps {
            apply(&mut world, &env, &step).map_err(|e| format!("Scenario '{name}': {e}"))?;
        }

        (self.oracle)(&world)
    }
}

fn apply(world: &mut World, env: &SimEnv, step: &Step) -> Result<(), String> {
    match step {
        Step::Deliver { client, destination, body } => world.deliver(client, destination, body),
        Step::Heartbeat { client } => world.pump(client, SimTransport::push_heartbeat),
        Step::ServerError { client, message } => {
            let text = format!("ERROR\nmessage:{message}\n\n");
            world.pump(client, |transport| transport.push_frame(text))
        },
        Step::Drop { client, reason } => {
            world.pump(client, |transport| transport.push_close(reason.as_str()))
        },
        Step::Reconnect { client } => world.reconnect(client),
        Step::AdvanceTime(by) => {
            env.advance(*by);
            Ok(())
        },
    }
}

/// Connect callback: subscribe to every destination and log the ids.
fn subscribe_on_connect(
    log: SharedLog,
    destinations: Vec<String>,
) -> impl Fn(&mut SimSession, &Frame) + Send + Sync + 'static {
    move |session, _frame| {
        let mut assigned = Vec::with_capacity(destinations.len());

        for destination in &destinations {
            let messages = Arc::clone(&log);
            let result = session.subscribe(
                destination,
                move |_, frame| lock(&messages).messages.push(frame.clone()),
                None,
            );

            match result {
                Ok(id) => assigned.push((destination.clone(), id)),
                Err(err) => tracing::warn!(destination = %destination, error = %err, "subscribe failed"),
            }
        }

        let mut log = lock(&log);
        log.connects += 1;
        log.subscriptions.extend(assigned);
    }
}

fn record_errors(log: SharedLog) -> impl Fn(&mut SimSession, &Frame) + Send + Sync + 'static {
    move |_, frame| lock(&log).errors.push(frame.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::oracle;

    #[test]
    fn scenario_requires_oracle() {
        let _runnable = Scenario::new("test").client("alice").oracle(Box::new(|_world| Ok(())));

        // `Scenario` itself has no `run`; only `.oracle(..)` produces one.
    }

    #[test]
    fn scenario_creates_connected_clients() {
        let scenario = Scenario::new("test").client("alice").client("bob").oracle(Box::new(|world| {
            assert_eq!(world.actor_names(), ["alice", "bob"]);
            assert!(world.all_connected());
            Ok(())
        }));

        scenario.run().expect("scenario should succeed");
    }

    #[test]
    fn unknown_client_is_reported() {
        let result = Scenario::new("typo")
            .client("alice")
            .subscribe("alcie", "/queue/a")
            .oracle(oracle::all_connected())
            .run();

        assert!(result.unwrap_err().contains("alcie"));
    }

    #[test]
    fn oracle_failure_propagates() {
        let result = Scenario::new("failing oracle")
            .client("alice")
            .oracle(Box::new(|_| Err("nope".to_string())))
            .run();

        assert_eq!(result, Err("nope".to_string()));
    }
}
