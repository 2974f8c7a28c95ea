use std::net::SocketAddr;

use statecast_shared::{ClientId, Value};

use crate::{Peer, PeerKey, Server, ServerError};

// PeerRef

pub struct PeerRef<'s> {
    peer: &'s Peer,
    key: PeerKey,
}

impl<'s> PeerRef<'s> {
    pub(crate) fn new(peer: &'s Peer, key: &PeerKey) -> Self {
        Self { peer, key: *key }
    }

    pub fn key(&self) -> PeerKey {
        self.key
    }

    pub fn id(&self) -> ClientId {
        self.key.client_id()
    }

    pub fn address(&self) -> SocketAddr {
        self.peer.address()
    }

    pub fn name(&self) -> Option<&'s str> {
        self.peer.name()
    }

    pub fn is_joined(&self) -> bool {
        self.peer.is_joined()
    }

    pub fn home(&self) -> &'s Value {
        self.peer.home()
    }

    pub fn setting(&self, key: &str) -> Option<&'s Value> {
        self.peer.settings().get(key)
    }
}

// PeerMut

pub struct PeerMut<'s> {
    server: &'s mut Server,
    key: PeerKey,
}

impl<'s> PeerMut<'s> {
    pub(crate) fn new(server: &'s mut Server, key: &PeerKey) -> Self {
        Self { server, key: *key }
    }

    pub fn key(&self) -> PeerKey {
        self.key
    }

    pub fn send_message(&mut self, message: Value) -> Result<(), ServerError> {
        self.server.send_message(&self.key, message)
    }

    /// Accepts a pending join request
    pub fn accept_join(&mut self) -> Result<(), ServerError> {
        self.server.accept_join(&self.key)
    }

    /// Closes the connection; a `DisconnectEvent` follows on a later
    /// `receive`
    pub fn disconnect(&mut self) {
        self.server.disconnect_peer(&self.key);
    }
}
