//! Reusable oracles.

use std::collections::HashSet;

use stomp_core::AdapterStatus;

use crate::scenario::OracleFn;

/// Every client ended `Connected`.
pub fn all_connected() -> OracleFn {
    Box::new(|world| {
        for name in world.actor_names() {
            let status = world.session(name).map(|session| session.status());
            if status != Some(AdapterStatus::Connected) {
                return Err(format!("{name} is {status:?}, expected Connected"));
            }
        }
        Ok(())
    })
}

/// No error callback fired for any client.
pub fn no_errors() -> OracleFn {
    Box::new(|world| {
        for name in world.actor_names() {
            let log = world.log(name).unwrap_or_default();
            if !log.errors.is_empty() {
                return Err(format!("{name} reported errors: {:?}", log.error_messages()));
            }
        }
        Ok(())
    })
}

/// No client was ever handed the same subscription id twice.
pub fn unique_subscription_ids() -> OracleFn {
    Box::new(|world| {
        for name in world.actor_names() {
            let log = world.log(name).unwrap_or_default();
            let mut seen = HashSet::new();
            for (_, id) in &log.subscriptions {
                if !seen.insert(id.as_str()) {
                    return Err(format!("{name} reused subscription id {id}"));
                }
            }
        }
        Ok(())
    })
}

/// `client` received exactly `bodies` on `destination`, in order.
pub fn received(client: &str, destination: &str, bodies: &[&str]) -> OracleFn {
    let client = client.to_string();
    let destination = destination.to_string();
    let expected: Vec<String> = bodies.iter().map(|body| (*body).to_string()).collect();

    Box::new(move |world| {
        let log = world.log(&client).ok_or_else(|| format!("unknown client {client}"))?;
        let actual = log.bodies(&destination);

        if actual != expected {
            return Err(format!("{client} received {actual:?} on {destination}, expected {expected:?}"));
        }
        Ok(())
    })
}

/// `client` ended in `status`.
pub fn status_is(client: &str, status: AdapterStatus) -> OracleFn {
    let client = client.to_string();

    Box::new(move |world| {
        let actual = world
            .session(&client)
            .map(|session| session.status())
            .ok_or_else(|| format!("unknown client {client}"))?;

        if actual != status {
            return Err(format!("{client} is {actual:?}, expected {status:?}"));
        }
        Ok(())
    })
}

/// `client`'s error callback saw an ERROR whose `message` is `message`.
pub fn error_reported(client: &str, message: &str) -> OracleFn {
    let client = client.to_string();
    let message = message.to_string();

    Box::new(move |world| {
        let log = world.log(&client).ok_or_else(|| format!("unknown client {client}"))?;

        if !log.error_messages().contains(&message.as_str()) {
            return Err(format!(
                "{client} never reported {message:?}, saw {:?}",
                log.error_messages()
            ));
        }
        Ok(())
    })
}

/// All oracles must pass; the first failure is returned.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in &oracles {
            oracle(world)?;
        }
        Ok(())
    })
}
