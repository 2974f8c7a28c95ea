use std::{collections::BTreeMap, net::SocketAddr};

use statecast_shared::{BigMapKey, ClientId, InputSequence, Value};

// PeerKey
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct PeerKey(u64);

impl PeerKey {
    /// The id this peer is known by on the wire and in state tree diffs
    pub fn client_id(&self) -> ClientId {
        ClientId::new(self.0)
    }
}

impl BigMapKey for PeerKey {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        PeerKey(value)
    }
}

impl From<PeerKey> for ClientId {
    fn from(key: PeerKey) -> Self {
        key.client_id()
    }
}

/// Server-side bookkeeping for one connected peer
pub struct Peer {
    address: SocketAddr,
    name: Option<String>,
    session_token: Option<Value>,
    settings: BTreeMap<String, Value>,
    join_requested: bool,
    joined: bool,
    last_input: Option<InputSequence>,
    // The peer's private state, updated only by the peer itself
    home: Value,
}

impl Peer {
    pub(crate) fn new(address: SocketAddr) -> Self {
        Self {
            address,
            name: None,
            session_token: None,
            settings: BTreeMap::new(),
            join_requested: false,
            joined: false,
            last_input: None,
            home: Value::empty_map(),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn session_token(&self) -> Option<&Value> {
        self.session_token.as_ref()
    }

    pub fn settings(&self) -> &BTreeMap<String, Value> {
        &self.settings
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn is_join_requested(&self) -> bool {
        self.join_requested
    }

    pub fn last_input(&self) -> Option<InputSequence> {
        self.last_input
    }

    pub fn home(&self) -> &Value {
        &self.home
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub(crate) fn set_session_token(&mut self, token: Value) {
        self.session_token = Some(token);
    }

    pub(crate) fn merge_settings(&mut self, settings: BTreeMap<String, Value>) {
        self.settings.extend(settings);
    }

    pub(crate) fn set_join_requested(&mut self) {
        self.join_requested = true;
    }

    pub(crate) fn set_joined(&mut self) {
        self.join_requested = false;
        self.joined = true;
    }

    pub(crate) fn set_last_input(&mut self, seq: InputSequence) {
        self.last_input = Some(seq);
    }

    pub(crate) fn take_home(&mut self) -> Value {
        std::mem::take(&mut self.home)
    }

    pub(crate) fn set_home(&mut self, home: Value) {
        self.home = home;
    }
}
