//! Scenario tests: whole client lifecycles checked by oracles.

use std::time::Duration;

use stomp_core::{AdapterStatus, SessionConfig};
use stomp_harness::{
    init_tracing,
    scenario::{Scenario, World, oracle},
};

#[test]
fn single_client_receives_in_order() {
    init_tracing();

    let result = Scenario::new("single client")
        .client("alice")
        .subscribe("alice", "/queue/orders")
        .deliver("alice", "/queue/orders", "order #1")
        .deliver("alice", "/queue/orders", "order #2")
        .oracle(oracle::all_of(vec![
            oracle::all_connected(),
            oracle::no_errors(),
            oracle::received("alice", "/queue/orders", &["order #1", "order #2"]),
            Box::new(|world: &World| {
                assert_eq!(world.sent_commands("alice"), ["CONNECT", "SUBSCRIBE"]);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn clients_are_isolated() {
    let result = Scenario::new("two clients")
        .client("alice")
        .client("bob")
        .subscribe("alice", "/topic/news")
        .subscribe("bob", "/topic/news")
        .subscribe("bob", "/queue/bob")
        .deliver("bob", "/queue/bob", "private")
        .deliver("alice", "/topic/news", "headline")
        .oracle(oracle::all_of(vec![
            oracle::all_connected(),
            oracle::received("alice", "/topic/news", &["headline"]),
            oracle::received("alice", "/queue/bob", &[]),
            oracle::received("bob", "/topic/news", &[]),
            oracle::received("bob", "/queue/bob", &["private"]),
            Box::new(|world: &World| {
                let bob = world.log("bob").ok_or("bob missing")?;
                assert_eq!(bob.subscription_id("/topic/news"), Some("sub-0"));
                assert_eq!(bob.subscription_id("/queue/bob"), Some("sub-1"));
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn reconnect_after_network_drop() {
    init_tracing();

    let result = Scenario::new("drop and reconnect")
        .client("alice")
        .subscribe("alice", "/queue/work")
        .deliver("alice", "/queue/work", "before")
        .drop_connection("alice", "network drop")
        .reconnect("alice")
        .deliver("alice", "/queue/work", "after")
        .oracle(oracle::all_of(vec![
            oracle::status_is("alice", AdapterStatus::Connected),
            oracle::error_reported("alice", "network drop"),
            oracle::unique_subscription_ids(),
            oracle::received("alice", "/queue/work", &["before", "after"]),
            Box::new(|world: &World| {
                let log = world.log("alice").ok_or("alice missing")?;
                assert_eq!(log.connects, 2);
                assert_eq!(log.subscription_id("/queue/work"), Some("sub-1"));
                assert_eq!(world.sent_commands("alice"), [
                    "CONNECT",
                    "SUBSCRIBE",
                    "CONNECT",
                    "SUBSCRIBE"
                ]);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn server_error_disconnects() {
    let result = Scenario::new("server error")
        .client("alice")
        .client("bob")
        .server_error("alice", "unauthorized")
        .oracle(oracle::all_of(vec![
            oracle::status_is("alice", AdapterStatus::Disconnected),
            oracle::status_is("bob", AdapterStatus::Connected),
            oracle::error_reported("alice", "unauthorized"),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn heartbeat_tracks_server_activity() {
    let result = Scenario::new("heartbeats")
        .client("alice")
        .client("bob")
        .advance_time(Duration::from_secs(3))
        .heartbeat("alice")
        .oracle(Box::new(|world| {
            let alice = world.session("alice").ok_or("alice missing")?.last_server_activity();
            let bob = world.session("bob").ok_or("bob missing")?.last_server_activity();

            assert_eq!(alice - bob, Duration::from_secs(3));
            assert_eq!(world.env().elapsed(), Duration::from_secs(3));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn connect_headers_reach_the_wire() {
    let result = Scenario::new("connect headers")
        .client("alice")
        .connect_header("alice", "login", "alice")
        .connect_header("alice", "passcode", "secret")
        .oracle(Box::new(|world| {
            let session = world.session("alice").ok_or("alice missing")?;
            assert_eq!(session.transport().sent()[0], concat!(
                "CONNECT\n",
                "accept-version:1.1,1.0\n",
                "heart-beat:10000,10000\n",
                "login:alice\n",
                "passcode:secret\n",
                "\n"
            ));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn custom_config_per_client() {
    let config = SessionConfig {
        subscription_id_prefix: "alice-".to_string(),
        heart_beat: (0, 0),
        ..SessionConfig::default()
    };

    let result = Scenario::new("custom config")
        .client_with_config("alice", config)
        .subscribe("alice", "/queue/a")
        .oracle(Box::new(|world| {
            let log = world.log("alice").ok_or("alice missing")?;
            assert_eq!(log.subscription_id("/queue/a"), Some("alice-0"));

            let session = world.session("alice").ok_or("alice missing")?;
            assert!(session.transport().sent()[0].contains("heart-beat:0,0\n"));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn delivery_without_subscription_fails_the_run() {
    let result = Scenario::new("no subscription")
        .client("alice")
        .deliver("alice", "/queue/nowhere", "lost")
        .oracle(oracle::all_connected())
        .run();

    let err = result.unwrap_err();
    assert!(err.contains("no subscription for /queue/nowhere"), "{err}");
}

#[test]
fn oracle_reports_wrong_bodies() {
    let result = Scenario::new("wrong expectation")
        .client("alice")
        .subscribe("alice", "/queue/a")
        .deliver("alice", "/queue/a", "actual")
        .oracle(oracle::received("alice", "/queue/a", &["expected"]))
        .run();

    let err = result.unwrap_err();
    assert!(err.contains("actual"), "{err}");
}
