/// Integration tests for joining: the full-state snapshot, join approval
/// and rejoining

use serde_json::json;

use statecast_server::{
    shared::BigMapKey, JoinEvent, JoinRequestEvent, PeerKey, ServerConfig, ServerError,
};
use statecast_test::{json_value, TestSession};

fn session_with_state(config: ServerConfig) -> TestSession {
    let mut session = TestSession::new(config);
    let share = session.server.share_mut();
    let root = share.root();
    share.set(root, "score", 1).unwrap();
    share
        .set(root, "players", json_value(json!({"p1": {"hp": 3}})))
        .unwrap();
    share.set(root, "_secret", "hidden").unwrap();
    session.tick();
    session
}

/// A data request sends the full state and announces the join
#[test]
fn data_request_joins_with_full_state() {
    let mut session = session_with_state(ServerConfig::default());
    let (alice_key, alice) = session.connect();
    let (_bob_key, bob) = session.connect();
    alice.receive_all();

    alice.send(json!({"dataRequest": true}));
    let mut events = session.receive();

    let joins: Vec<PeerKey> = events.read::<JoinEvent>().collect();
    assert_eq!(joins, vec![alice_key]);
    assert!(session.server.peer(&alice_key).is_joined());

    let alice_id = alice_key.client_id().value();
    assert_eq!(
        alice.receive_all(),
        vec![
            json!({
                "exact": {"__exact": true, "score": 1, "players": {"p1": {"hp": 3}}},
                "joinAck": true
            }),
            json!({"peer_joined": alice_id}),
        ]
    );
    assert_eq!(bob.receive_all(), vec![json!({"peer_joined": alice_id})]);
    assert_eq!(session.server.joined_peer_keys(), vec![alice_key]);
}

/// The snapshot includes writes made earlier in the same cycle
#[test]
fn join_sees_pending_writes() {
    let mut session = session_with_state(ServerConfig::default());
    let (_key, peer) = session.connect();

    let share = session.server.share_mut();
    let root = share.root();
    share.set(root, "score", 2).unwrap();

    peer.send(json!({"dataRequest": true}));
    session.receive();

    let packets = peer.receive_all();
    assert_eq!(packets[0]["exact"]["score"], json!(2));
}

/// Asking again resends the state without a second join
#[test]
fn rejoin_resends_state_only() {
    let mut session = session_with_state(ServerConfig::default());
    let (_alice_key, alice) = session.join();
    let (_bob_key, bob) = session.connect();
    alice.receive_all();

    alice.send(json!({"dataRequest": true}));
    let events = session.receive();

    assert!(!events.has::<JoinEvent>());
    let packets = alice.receive_all();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0]["joinAck"], json!(true));
    assert_eq!(packets[0]["exact"]["__exact"], json!(true));
    assert!(bob.receive_all().is_empty());
}

/// With approval required a data request only raises a request event
#[test]
fn join_waits_for_approval() {
    let mut session = session_with_state(ServerConfig {
        require_join_accept: true,
        ..ServerConfig::default()
    });
    let (key, peer) = session.connect();

    peer.send(json!({"dataRequest": true}));
    let mut events = session.receive();

    let requests: Vec<PeerKey> = events.read::<JoinRequestEvent>().collect();
    assert_eq!(requests, vec![key]);
    assert!(!events.has::<JoinEvent>());
    assert!(peer.receive_all().is_empty());
    assert!(!session.server.peer(&key).is_joined());

    session.server.peer_mut(&key).accept_join().unwrap();
    let packets = peer.receive_messages();
    assert!(packets[0].join_ack);
    assert!(packets[0].exact.as_ref().unwrap().is_exact());

    let mut events = session.receive();
    let joins: Vec<PeerKey> = events.read::<JoinEvent>().collect();
    assert_eq!(joins, vec![key]);
    assert!(session.server.peer(&key).is_joined());
}

/// A joined peer asking again is not held back by approval
#[test]
fn approved_peer_rejoins_directly() {
    let mut session = session_with_state(ServerConfig {
        require_join_accept: true,
        ..ServerConfig::default()
    });
    let (key, peer) = session.connect();
    session.server.accept_join(&key).unwrap();
    session.receive();
    peer.receive_all();

    peer.send(json!({"dataRequest": true}));
    let events = session.receive();

    assert!(!events.has::<JoinRequestEvent>());
    assert_eq!(peer.receive_all().len(), 1);
}

/// Accepting an unknown peer fails
#[test]
fn accept_unknown_peer_fails() {
    let mut session = TestSession::new(ServerConfig::default());

    let result = session.server.accept_join(&PeerKey::from_u64(99));

    assert!(matches!(result, Err(ServerError::PeerNotFound { .. })));
}
