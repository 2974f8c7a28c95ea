use std::net::SocketAddr;

use statecast_server::{
    shared::Value,
    transport::{ChannelConnector, ChannelSocket},
    ConnectEvent, Events, PeerKey, Server, ServerConfig,
};

use super::TestPeer;

const FIRST_PORT: u16 = 40000;

/// A listening server plus a connector for opening test peers
pub struct TestSession {
    pub server: Server,
    connector: ChannelConnector,
    next_port: u16,
}

impl TestSession {
    pub fn new(config: ServerConfig) -> Self {
        init_logging();

        let (socket, connector) = ChannelSocket::unbounded();
        let mut server = Server::new(config);
        server.listen(socket);

        Self {
            server,
            connector,
            next_port: FIRST_PORT,
        }
    }

    /// Opens a connection. The server sees it on the next `receive`.
    pub fn open(&mut self) -> TestPeer {
        let address = SocketAddr::from(([127, 0, 0, 1], self.next_port));
        self.next_port += 1;

        let client = self
            .connector
            .connect(address)
            .expect("server socket dropped before the connector");
        TestPeer::new(client)
    }

    /// Opens a connection, lets the server accept it and drops the
    /// greeting packets
    pub fn connect(&mut self) -> (PeerKey, TestPeer) {
        let peer = self.open();
        let mut events = self.server.receive();
        let peer_key = events
            .read::<ConnectEvent>()
            .next()
            .expect("server refused the connection");
        peer.receive_all();

        (peer_key, peer)
    }

    /// Connects a peer and joins it to the session
    pub fn join(&mut self) -> (PeerKey, TestPeer) {
        let (peer_key, peer) = self.connect();
        peer.send(serde_json::json!({"dataRequest": true}));
        self.server.receive();
        peer.receive_all();

        (peer_key, peer)
    }

    pub fn receive(&mut self) -> Events {
        self.server.receive()
    }

    /// Ends one synchronization cycle
    pub fn tick(&mut self) {
        self.server
            .send_all_updates()
            .expect("relevance failed during tick");
    }
}

/// Enables `RUST_LOG` output for a test binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Converts a JSON literal into a state value
pub fn json_value(value: serde_json::Value) -> Value {
    serde_json::from_value(value).expect("json always reads as a value")
}
