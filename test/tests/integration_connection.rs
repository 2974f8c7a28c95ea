/// Integration tests for the connection lifecycle: greeting, refusal,
/// version checks, identity and disconnection

use serde_json::json;

use statecast_server::{
    shared::Value, ConnectEvent, DisconnectEvent, IdentityEvent, JoinEvent, ServerConfig,
};
use statecast_test::TestSession;

/// A new peer learns its id and everyone hears about it
#[test]
fn connect_greets_peer_and_announces_it() {
    let mut session = TestSession::new(ServerConfig::default());

    let alice = session.open();
    let mut events = session.receive();
    let alice_key = events.read::<ConnectEvent>().next().unwrap();
    let alice_id = alice_key.client_id().value();

    assert_eq!(
        alice.receive_all(),
        vec![json!({"id": alice_id}), json!({"peer_connected": alice_id})]
    );

    let (bob_key, _bob) = session.connect();
    assert_ne!(alice_key, bob_key);
    assert_eq!(
        alice.receive_all(),
        vec![json!({"peer_connected": bob_key.client_id().value()})]
    );
    assert_eq!(session.server.peers_count(), 2);
}

/// Ids are never handed out twice, even after a disconnect
#[test]
fn ids_are_not_reused() {
    let mut session = TestSession::new(ServerConfig::default());

    let (first_key, first) = session.connect();
    first.disconnect();
    session.receive();

    let (second_key, _second) = session.connect();
    assert_ne!(first_key.client_id(), second_key.client_id());
}

/// A full server refuses with a warning and closes the connection
#[test]
fn full_server_refuses_connection() {
    let mut session = TestSession::new(ServerConfig {
        max_clients: 1,
        ..ServerConfig::default()
    });
    let (_alice_key, alice) = session.connect();

    let bob = session.open();
    let mut events = session.receive();

    assert!(!events.has::<ConnectEvent>());
    assert!(!events.has::<DisconnectEvent>());
    let packets = bob.receive_all();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0]["full"], json!(true));
    assert!(packets[0]["warning"].is_string());
    assert!(bob.is_terminated());

    // nobody was told about the refused peer
    assert!(alice.receive_all().is_empty());
    assert_eq!(session.server.peers_count(), 1);
}

/// A server that stopped accepting refuses everyone
#[test]
fn closed_server_refuses_connection() {
    let mut session = TestSession::new(ServerConfig {
        accepting_clients: false,
        ..ServerConfig::default()
    });

    let peer = session.open();
    let events = session.receive();

    assert!(events.is_empty());
    let packets = peer.receive_all();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0]["full"], json!(true));
    assert!(peer.is_terminated());
    assert_eq!(session.server.peers_count(), 0);
}

/// A matching version is acknowledged
#[test]
fn matching_version_is_acknowledged() {
    let mut session = TestSession::new(ServerConfig {
        version: "1.2".to_string(),
        ..ServerConfig::default()
    });
    let (_key, peer) = session.connect();

    peer.send(json!({"version": "1.2"}));
    session.receive();

    assert_eq!(peer.receive_all(), vec![json!({"versionAck": true})]);
    assert!(!peer.is_terminated());
}

/// The default version accepts whatever the peer runs
#[test]
fn wildcard_version_accepts_anything() {
    let mut session = TestSession::new(ServerConfig::default());
    let (_key, peer) = session.connect();

    peer.send(json!({"version": "0.0.1-beta"}));
    session.receive();

    assert_eq!(peer.receive_all(), vec![json!({"versionAck": true})]);
}

/// A mismatched version gets a warning, the connection closes and the rest
/// of the packet is ignored
#[test]
fn mismatched_version_disconnects() {
    let mut session = TestSession::new(ServerConfig {
        version: "1.2".to_string(),
        ..ServerConfig::default()
    });
    let (key, peer) = session.connect();

    peer.send(json!({"version": "0.9", "dataRequest": true}));
    let mut events = session.receive();

    let packets = peer.receive_all();
    assert_eq!(packets.len(), 1);
    assert!(packets[0]["warning"].is_string());
    assert!(packets[0].get("joinAck").is_none());
    assert!(peer.is_terminated());

    assert!(!events.has::<JoinEvent>());
    let disconnected: Vec<_> = events.read::<DisconnectEvent>().collect();
    assert_eq!(disconnected, vec![(key, peer.address())]);
    assert!(!session.server.peer_exists(&key));
}

/// Name, session token and settings are stored on the peer
#[test]
fn identity_and_settings_are_recorded() {
    let mut session = TestSession::new(ServerConfig::default());
    let (key, peer) = session.connect();

    peer.send(json!({
        "name": "ann",
        "sessionToken": {"token": "abc"},
        "settings": {"color": "red", "volume": 3}
    }));
    let mut events = session.receive();

    let identities: Vec<_> = events.read::<IdentityEvent>().collect();
    assert_eq!(identities, vec![(key, "ann".to_string())]);

    let peer_ref = session.server.peer(&key);
    assert_eq!(peer_ref.name(), Some("ann"));
    assert_eq!(peer_ref.setting("color"), Some(&Value::from("red")));
    assert_eq!(peer_ref.setting("volume"), Some(&Value::from(3)));
    assert!(!peer_ref.is_joined());

    // later settings merge into earlier ones
    peer.send(json!({"settings": {"color": "blue"}}));
    session.receive();
    let peer_ref = session.server.peer(&key);
    assert_eq!(peer_ref.setting("color"), Some(&Value::from("blue")));
    assert_eq!(peer_ref.setting("volume"), Some(&Value::from(3)));
}

/// An empty name is not an identity
#[test]
fn empty_name_is_ignored() {
    let mut session = TestSession::new(ServerConfig::default());
    let (key, peer) = session.connect();

    peer.send(json!({"name": ""}));
    let events = session.receive();

    assert!(!events.has::<IdentityEvent>());
    assert_eq!(session.server.peer(&key).name(), None);
}

/// A peer closing its connection is announced to the others
#[test]
fn peer_disconnect_is_broadcast() {
    let mut session = TestSession::new(ServerConfig::default());
    let (alice_key, alice) = session.connect();
    let (bob_key, bob) = session.connect();
    alice.receive_all();

    let bob_address = bob.address();
    bob.disconnect();
    let mut events = session.receive();

    let disconnected: Vec<_> = events.read::<DisconnectEvent>().collect();
    assert_eq!(disconnected, vec![(bob_key, bob_address)]);
    assert_eq!(
        alice.receive_all(),
        vec![json!({"peer_disconnected": bob_key.client_id().value()})]
    );
    assert!(session.server.peer_exists(&alice_key));
    assert!(session.server.home(&bob_key).is_none());
    assert_eq!(session.server.peers_count(), 1);
}

/// The server can close a connection itself
#[test]
fn server_disconnects_peer() {
    let mut session = TestSession::new(ServerConfig::default());
    let (key, peer) = session.connect();

    session.server.peer_mut(&key).disconnect();
    assert!(peer.is_terminated());

    let mut events = session.receive();
    let disconnected: Vec<_> = events.read::<DisconnectEvent>().collect();
    assert_eq!(disconnected, vec![(key, peer.address())]);
    assert_eq!(session.server.peers_count(), 0);
}

/// Nothing happening means no events
#[test]
fn quiet_receive_is_empty() {
    let mut session = TestSession::new(ServerConfig::default());
    let (_key, _peer) = session.connect();

    assert!(session.receive().is_empty());
}
