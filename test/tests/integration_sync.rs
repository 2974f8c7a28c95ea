/// Integration tests for per-tick updates: diffs reach joined peers only,
/// scoped by relevance

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde_json::json;

use statecast_server::{
    shared::{ClientId, KeySet, Value},
    ServerConfig, ServerError,
};
use statecast_test::{json_value, TestSession};

fn keys(keys: &[&str]) -> KeySet {
    keys.iter().map(|key| key.to_string()).collect()
}

fn join_ack(packets: Vec<serde_json::Value>) -> serde_json::Value {
    packets
        .into_iter()
        .find(|packet| packet.get("joinAck").is_some())
        .unwrap()
}

/// Changes reach joined peers as diffs, connected-only peers get nothing
#[test]
fn tick_sends_diffs_to_joined_peers() {
    let mut session = TestSession::new(ServerConfig::default());
    {
        let share = session.server.share_mut();
        let root = share.root();
        share.set(root, "score", 1).unwrap();
        share
            .set(root, "players", json_value(json!({"p1": {"hp": 3}})))
            .unwrap();
    }
    session.tick();

    let (_alice_key, alice) = session.join();
    let (_bob_key, bob) = session.connect();
    alice.receive_all();

    let share = session.server.share_mut();
    let root = share.root();
    share.set(root, "score", 2).unwrap();
    let players = share.child(root, "players").unwrap();
    let p1 = share.child(players, "p1").unwrap();
    share.set(p1, "hp", 4).unwrap();
    session.tick();

    assert_eq!(
        alice.receive_all(),
        vec![json!({"diff": {"score": 2, "players": {"p1": {"hp": 4}}}})]
    );
    assert!(bob.receive_all().is_empty());

    // nothing changed since
    session.tick();
    assert!(alice.receive_all().is_empty());
}

/// Removals, new subtrees and private keys
#[test]
fn tick_sends_removals_and_hides_private_keys() {
    let mut session = TestSession::new(ServerConfig::default());
    {
        let share = session.server.share_mut();
        let root = share.root();
        share.set(root, "score", 1).unwrap();
    }
    session.tick();
    let (_key, peer) = session.join();

    let share = session.server.share_mut();
    let root = share.root();
    share.set(root, "score", Value::Null).unwrap();
    share.set(root, "_secret", 7).unwrap();
    share
        .set(root, "zone", json_value(json!({"door": "open"})))
        .unwrap();
    session.tick();

    assert_eq!(
        peer.receive_all(),
        vec![json!({"diff": {"score": "__NIL", "zone": {"__exact": true, "door": "open"}}})]
    );

    let share = session.server.share_mut();
    let root = share.root();
    share.set(root, "_secret", 8).unwrap();
    session.tick();
    assert!(peer.receive_all().is_empty());
}

/// The tick counter advances once per cycle
#[test]
fn tick_counter_advances() {
    let mut session = TestSession::new(ServerConfig::default());
    let start = session.server.current_tick();

    session.tick();
    session.tick();

    assert_eq!(session.server.current_tick(), start.wrapping_add(2));
}

/// Each peer sees only the zones its relevance function allows, and learns
/// when zones enter or leave its view
#[test]
fn relevance_scopes_updates_per_peer() {
    let mut session = TestSession::new(ServerConfig::default());
    let visible: Arc<Mutex<HashMap<ClientId, KeySet>>> = Arc::default();

    let zones = {
        let share = session.server.share_mut();
        let root = share.root();
        share
            .set(root, "zones", json_value(json!({"a": {"v": 1}, "b": {"v": 2}})))
            .unwrap();
        let zones = share.child(root, "zones").unwrap();
        let lookup = visible.clone();
        share
            .set_relevance_fn(zones, move |_node, client| {
                Ok(lookup.lock().unwrap().get(&client).cloned().unwrap_or_default())
            })
            .unwrap();
        zones
    };
    session.tick();

    let (alice_key, alice) = session.connect();
    let (bob_key, bob) = session.connect();
    alice.receive_all();
    {
        let mut visible = visible.lock().unwrap();
        visible.insert(alice_key.client_id(), keys(&["a"]));
        visible.insert(bob_key.client_id(), keys(&["b"]));
    }

    alice.send(json!({"dataRequest": true}));
    bob.send(json!({"dataRequest": true}));
    session.receive();

    assert_eq!(
        join_ack(alice.receive_all())["exact"],
        json!({"__exact": true, "zones": {"a": {"v": 1}}})
    );
    assert_eq!(
        join_ack(bob.receive_all())["exact"],
        json!({"__exact": true, "zones": {"b": {"v": 2}}})
    );

    // settle the first cycle after joining
    session.tick();
    alice.receive_all();
    bob.receive_all();

    // a change inside a zone only reaches peers that see it
    {
        let share = session.server.share_mut();
        let a = share.child(zones, "a").unwrap();
        share.set(a, "v", 5).unwrap();
    }
    session.tick();
    assert_eq!(
        alice.receive_all(),
        vec![json!({"diff": {"zones": {"a": {"v": 5}}}})]
    );
    assert!(bob.receive_all().is_empty());

    // zones leaving a view are removed, zones entering it are sent whole
    {
        let mut visible = visible.lock().unwrap();
        visible.insert(alice_key.client_id(), keys(&["b"]));
        visible.insert(bob_key.client_id(), keys(&["a", "b"]));
    }
    session.tick();
    assert_eq!(
        alice.receive_all(),
        vec![json!({"diff": {"zones": {"a": "__NIL", "b": {"__exact": true, "v": 2}}}})]
    );
    assert_eq!(
        bob.receive_all(),
        vec![json!({"diff": {"zones": {"a": {"__exact": true, "v": 5}}}})]
    );
}

/// A failing relevance function aborts the cycle without flushing
#[test]
fn relevance_failure_aborts_tick() {
    let mut session = TestSession::new(ServerConfig::default());
    {
        let share = session.server.share_mut();
        let root = share.root();
        share
            .set(root, "zones", json_value(json!({"a": {"v": 1}})))
            .unwrap();
    }
    let (_key, _peer) = session.join();
    {
        let share = session.server.share_mut();
        let root = share.root();
        let zones = share.child(root, "zones").unwrap();
        share
            .set_relevance_fn(zones, |_node, client| {
                Err(format!("no zone for client {}", client).into())
            })
            .unwrap();
    }

    let tick = session.server.current_tick();
    let result = session.server.send_all_updates();

    assert!(matches!(result, Err(ServerError::State(_))));
    assert_eq!(session.server.current_tick(), tick);
}
