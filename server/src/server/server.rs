use std::{collections::HashMap, mem, net::SocketAddr};

use log::{debug, info, trace, warn};

use statecast_shared::{apply, BigMap, Delta, StateTree, Tick, Value};

use crate::{
    codec::{Codec, Compression, JsonCodec},
    events::Events,
    protocol::{ClientMessage, ServerMessage},
    transport::{Socket, TransportEvent},
    Peer, PeerKey, PeerMut, PeerRef, ServerConfig, ServerError,
};

const FULL_WARNING: &str = "Connection refused: server is full";
const CLOSED_WARNING: &str = "Connection refused: server is not accepting clients";
const VERSION_WARNING: &str = "Connection refused: client version mismatch";

/// A server that owns the authoritative shared state, tracks connected
/// peers and their private home states, and streams each joined peer the
/// part of the shared state it can see
pub struct Server {
    config: ServerConfig,
    socket: Option<Box<dyn Socket>>,
    codec: Box<dyn Codec>,
    compression: Compression,
    // State
    share: StateTree,
    // Peers
    peers: BigMap<PeerKey, Peer>,
    peer_addresses: HashMap<SocketAddr, PeerKey>,
    // Events
    incoming_events: Events,
    tick: Tick,
}

impl Server {
    /// Create a new Server speaking JSON
    pub fn new(config: ServerConfig) -> Self {
        Self::with_codec(config, JsonCodec)
    }

    /// Create a new Server with a custom payload codec
    pub fn with_codec<C: Codec + 'static>(config: ServerConfig, codec: C) -> Self {
        let compression = Compression::new(config.compression);

        let mut share = StateTree::new();
        let root = share.root();
        share
            .enable_auto_sync(root, true)
            .expect("a new tree always has its root");

        Self {
            config,
            socket: None,
            codec: Box::new(codec),
            compression,
            share,
            peers: BigMap::new(),
            peer_addresses: HashMap::new(),
            incoming_events: Events::new(),
            tick: 0,
        }
    }

    /// Listen on the given socket
    pub fn listen<S: Socket + 'static>(&mut self, socket: S) {
        self.socket = Some(Box::new(socket));
    }

    /// Returns whether or not the Server has a socket to listen on
    pub fn is_listening(&self) -> bool {
        self.socket.is_some()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of completed `send_all_updates` calls, wrapping
    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Must be called regularly, handles connections and every packet
    /// received from peers since the last call
    pub fn receive(&mut self) -> Events {
        self.maintain_socket();

        mem::replace(&mut self.incoming_events, Events::new())
    }

    /// Ends one synchronization cycle: sends every joined peer its diff of
    /// the shared state, then flushes the shared state once.
    ///
    /// Write to the shared state before calling this, not in between. If a
    /// relevance function fails the error is returned and nothing is
    /// flushed.
    pub fn send_all_updates(&mut self) -> Result<(), ServerError> {
        let root = self.share.root();
        let joined: Vec<(PeerKey, SocketAddr)> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.is_joined())
            .map(|(peer_key, peer)| (peer_key, peer.address()))
            .collect();

        let mut sent = 0;
        for (peer_key, address) in joined {
            let Some(delta) = self.share.diff(root, peer_key.client_id(), false)? else {
                continue;
            };
            trace!(
                "tick {}: diff of {} key(s) for peer {}",
                self.tick,
                delta.len(),
                peer_key.client_id()
            );
            self.send_to_address(&address, &ServerMessage::diff(delta));
            sent += 1;
        }

        self.share.flush(root, None)?;
        debug!("tick {}: sent updates to {} peer(s)", self.tick, sent);
        self.tick = self.tick.wrapping_add(1);

        Ok(())
    }

    // Shared state

    /// The authoritative state every joined peer observes
    pub fn share(&self) -> &StateTree {
        &self.share
    }

    /// Mutable access to the shared state. Its root has recursive auto-sync
    /// enabled, so writes through [`StateTree::set`] are picked up by the
    /// next `send_all_updates`.
    pub fn share_mut(&mut self) -> &mut StateTree {
        &mut self.share
    }

    // Peers

    /// Returns whether or not a Peer exists for the given PeerKey
    pub fn peer_exists(&self, peer_key: &PeerKey) -> bool {
        self.peers.contains_key(peer_key)
    }

    /// Retrieves a PeerRef that exposes read-only operations for the Peer
    /// associated with the given PeerKey.
    /// Panics if the peer does not exist.
    pub fn peer(&self, peer_key: &PeerKey) -> PeerRef {
        if let Some(peer) = self.peers.get(peer_key) {
            return PeerRef::new(peer, peer_key);
        }
        panic!("No Peer exists for given Key!");
    }

    /// Retrieves a PeerMut that exposes read and write operations for the
    /// Peer associated with the given PeerKey.
    /// Panics if the peer does not exist.
    pub fn peer_mut(&mut self, peer_key: &PeerKey) -> PeerMut {
        if self.peers.contains_key(peer_key) {
            return PeerMut::new(self, peer_key);
        }
        panic!("No Peer exists for given Key!");
    }

    /// Return a list of all currently connected Peers' keys
    pub fn peer_keys(&self) -> Vec<PeerKey> {
        self.peers.iter().map(|(peer_key, _)| peer_key).collect()
    }

    /// Return a list of the keys of Peers that have joined
    pub fn joined_peer_keys(&self) -> Vec<PeerKey> {
        self.peers
            .iter()
            .filter(|(_, peer)| peer.is_joined())
            .map(|(peer_key, _)| peer_key)
            .collect()
    }

    /// Get the number of Peers currently connected
    pub fn peers_count(&self) -> usize {
        self.peers.len()
    }

    /// The private state the peer has built up through its own updates
    pub fn home(&self, peer_key: &PeerKey) -> Option<&Value> {
        self.peers.get(peer_key).map(Peer::home)
    }

    /// Joins a peer whose `dataRequest` is waiting, when
    /// [`ServerConfig::require_join_accept`] is set. Joining sends the peer
    /// the full shared state.
    pub fn accept_join(&mut self, peer_key: &PeerKey) -> Result<(), ServerError> {
        let peer = self
            .peers
            .get(peer_key)
            .ok_or(ServerError::PeerNotFound { key: *peer_key })?;
        if peer.is_joined() {
            return Ok(());
        }
        self.join(peer_key)
    }

    /// Closes the peer's connection. Its `DisconnectEvent` arrives with a
    /// later `receive`.
    pub fn disconnect_peer(&mut self, peer_key: &PeerKey) {
        let Some(peer) = self.peers.get(peer_key) else {
            return;
        };
        let address = peer.address();
        self.terminate(&address);
    }

    // Messages

    /// Sends a free-form message to one peer
    pub fn send_message(&mut self, peer_key: &PeerKey, message: Value) -> Result<(), ServerError> {
        let peer = self
            .peers
            .get(peer_key)
            .ok_or(ServerError::PeerNotFound { key: *peer_key })?;
        let address = peer.address();
        let payload = self.encode(&ServerMessage::message(message))?;
        self.send_payload(&address, &payload)
    }

    /// Sends a free-form message to every connected peer
    pub fn broadcast_message(&mut self, message: Value) {
        self.broadcast(&ServerMessage::message(message));
    }

    // Private methods

    fn maintain_socket(&mut self) {
        loop {
            let Some(socket) = self.socket.as_mut() else {
                return;
            };
            match socket.receive() {
                Ok(Some(TransportEvent::Connected(address))) => {
                    self.handle_connect(address);
                }
                Ok(Some(TransportEvent::Packet(address, payload))) => {
                    self.handle_packet(address, &payload);
                }
                Ok(Some(TransportEvent::Disconnected(address))) => {
                    self.handle_disconnect(address);
                }
                Ok(None) => {
                    // No more events, break loop
                    break;
                }
                Err(error) => {
                    warn!("Server Error: transport closed: {}", error);
                    self.incoming_events.push_error(ServerError::Recv(error));
                    break;
                }
            }
        }
    }

    fn handle_connect(&mut self, address: SocketAddr) {
        let refusal = if !self.config.accepting_clients {
            Some(CLOSED_WARNING)
        } else if self.peers.len() >= self.config.max_clients {
            Some(FULL_WARNING)
        } else {
            None
        };
        if let Some(warning) = refusal {
            warn!("refusing connection from {}: {}", address, warning);
            self.send_to_address(&address, &ServerMessage::full(warning));
            self.terminate(&address);
            return;
        }

        let peer_key = self.peers.insert(Peer::new(address));
        self.peer_addresses.insert(address, peer_key);
        let id = peer_key.client_id();
        info!("peer {} connected from {}", id, address);

        self.incoming_events.push_connection(&peer_key);
        self.send_to_address(&address, &ServerMessage::id(id));
        self.broadcast(&ServerMessage::peer_connected(id));
    }

    fn handle_disconnect(&mut self, address: SocketAddr) {
        let Some(peer_key) = self.peer_addresses.remove(&address) else {
            return;
        };
        self.peers.remove(&peer_key);
        let id = peer_key.client_id();
        info!("peer {} disconnected", id);

        self.incoming_events.push_disconnection(&peer_key, address);
        self.broadcast(&ServerMessage::peer_disconnected(id));
    }

    fn handle_packet(&mut self, address: SocketAddr, payload: &[u8]) {
        let Some(peer_key) = self.peer_addresses.get(&address).copied() else {
            warn!("Server Error: dropping packet from unknown address {}", address);
            return;
        };

        let decoded = self
            .compression
            .decompress(payload)
            .and_then(|payload| self.codec.decode(&payload));
        match decoded {
            Ok(message) => self.handle_message(&peer_key, message),
            Err(source) => {
                warn!("Server Error: cannot read packet from {}: {}", address, source);
                self.incoming_events
                    .push_error(ServerError::Decode { address, source });
            }
        }
    }

    fn handle_message(&mut self, peer_key: &PeerKey, message: ClientMessage) {
        let ClientMessage {
            name,
            session_token,
            version,
            settings,
            data_request,
            message,
            input_stream,
            seq,
            diff,
            exact,
        } = message;
        let id = peer_key.client_id();

        if let Some(name) = name.filter(|name| !name.is_empty()) {
            info!("peer {} identified as '{}'", id, name);
            if let Some(peer) = self.peers.get_mut(peer_key) {
                peer.set_name(name.clone());
            }
            self.incoming_events.push_identity(peer_key, name);
        }

        if let Some(token) = session_token {
            debug!("peer {} sent a session token", id);
            if let Some(peer) = self.peers.get_mut(peer_key) {
                peer.set_session_token(token);
            }
        }

        if let Some(version) = version {
            if !self.config.accepts_version(&version) {
                warn!(
                    "refusing peer {}: version '{}' does not match '{}'",
                    id, version, self.config.version
                );
                self.send_to_peer(peer_key, &ServerMessage::warning(VERSION_WARNING));
                self.disconnect_peer(peer_key);
                return;
            }
            self.send_to_peer(peer_key, &ServerMessage::version_ack());
        }

        if let Some(settings) = settings {
            if let Some(peer) = self.peers.get_mut(peer_key) {
                peer.merge_settings(settings);
            }
        }

        if data_request {
            self.request_join(peer_key);
        }

        if let Some(message) = message {
            self.incoming_events.push_message(peer_key, message);
        }

        if let Some(input) = input_stream {
            if let Some(seq) = seq {
                if let Some(peer) = self.peers.get_mut(peer_key) {
                    peer.set_last_input(seq);
                }
                self.send_to_peer(peer_key, &ServerMessage::input_ack(seq));
            }
            self.incoming_events.push_input(peer_key, input, seq);
        }

        if let Some(delta) = diff {
            self.update_home(peer_key, delta, false);
        }

        if let Some(delta) = exact {
            self.update_home(peer_key, delta, true);
        }
    }

    fn request_join(&mut self, peer_key: &PeerKey) {
        let Some(peer) = self.peers.get_mut(peer_key) else {
            return;
        };
        if !peer.is_joined() && self.config.require_join_accept {
            peer.set_join_requested();
            self.incoming_events.push_join_request(peer_key);
            return;
        }

        if let Err(error) = self.join(peer_key) {
            warn!("Server Error: peer {} cannot join: {}", peer_key.client_id(), error);
            self.incoming_events.push_error(error);
        }
    }

    // Sends the full shared state. A peer that already joined only gets
    // the state again.
    fn join(&mut self, peer_key: &PeerKey) -> Result<(), ServerError> {
        let id = peer_key.client_id();
        let root = self.share.root();

        let exact = self.share.diff(root, id, true)?;
        // this cycle's writes may not be done yet
        self.share.invalidate_caches();

        let peer = self
            .peers
            .get_mut(peer_key)
            .ok_or(ServerError::PeerNotFound { key: *peer_key })?;
        let address = peer.address();
        let rejoin = peer.is_joined();
        peer.set_joined();

        let payload = self.encode(&ServerMessage::join_ack(exact))?;
        self.send_payload(&address, &payload)?;
        if rejoin {
            debug!("peer {} requested the full state again", id);
            return Ok(());
        }

        info!("peer {} joined", id);
        self.incoming_events.push_join(peer_key);
        self.broadcast(&ServerMessage::peer_joined(id));

        Ok(())
    }

    fn update_home(&mut self, peer_key: &PeerKey, mut delta: Delta, exact: bool) {
        let Some(peer) = self.peers.get_mut(peer_key) else {
            return;
        };
        if exact {
            delta.set_exact(true);
        }

        let home = apply(peer.take_home(), Some(delta.clone()));
        peer.set_home(home);
        trace!("peer {} updated {} home key(s)", peer_key.client_id(), delta.len());

        self.incoming_events.push_home(peer_key, delta);
    }

    fn encode(&self, message: &ServerMessage) -> Result<Vec<u8>, ServerError> {
        self.codec
            .encode(message)
            .and_then(|payload| self.compression.compress(payload))
            .map_err(ServerError::Encode)
    }

    fn send_payload(&mut self, address: &SocketAddr, payload: &[u8]) -> Result<(), ServerError> {
        let socket = self.socket.as_mut().ok_or(ServerError::NotListening)?;
        socket
            .send(address, payload)
            .map_err(|source| ServerError::Send {
                address: *address,
                source,
            })
    }

    // Failures become ErrorEvents. A peer whose connection is gone is
    // cleaned up when its disconnect arrives.
    fn send_to_address(&mut self, address: &SocketAddr, message: &ServerMessage) {
        let result = self
            .encode(message)
            .and_then(|payload| self.send_payload(address, &payload));
        if let Err(error) = result {
            warn!("Server Error: cannot send packet to {}: {}", address, error);
            self.incoming_events.push_error(error);
        }
    }

    fn send_to_peer(&mut self, peer_key: &PeerKey, message: &ServerMessage) {
        if let Some(address) = self.peers.get(peer_key).map(Peer::address) {
            self.send_to_address(&address, message);
        }
    }

    fn broadcast(&mut self, message: &ServerMessage) {
        let payload = match self.encode(message) {
            Ok(payload) => payload,
            Err(error) => {
                warn!("Server Error: cannot encode broadcast: {}", error);
                self.incoming_events.push_error(error);
                return;
            }
        };

        let addresses: Vec<SocketAddr> = self.peer_addresses.keys().copied().collect();
        for address in addresses {
            if let Err(error) = self.send_payload(&address, &payload) {
                warn!("Server Error: cannot send packet to {}: {}", address, error);
                self.incoming_events.push_error(error);
            }
        }
    }

    fn terminate(&mut self, address: &SocketAddr) {
        if let Some(socket) = self.socket.as_mut() {
            socket.terminate(address);
        }
    }
}
