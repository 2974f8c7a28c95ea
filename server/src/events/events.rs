use std::{net::SocketAddr, vec::IntoIter};

use statecast_shared::{Delta, InputSequence, Value};

use crate::{PeerKey, ServerError};

/// Everything that happened since the previous [`Server::receive`](crate::Server::receive)
pub struct Events {
    connections: Vec<PeerKey>,
    disconnections: Vec<(PeerKey, SocketAddr)>,
    identities: Vec<(PeerKey, String)>,
    join_requests: Vec<PeerKey>,
    joins: Vec<PeerKey>,
    messages: Vec<(PeerKey, Value)>,
    inputs: Vec<(PeerKey, Value, Option<InputSequence>)>,
    homes: Vec<(PeerKey, Delta)>,
    errors: Vec<ServerError>,

    empty: bool,
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    pub(crate) fn new() -> Self {
        Self {
            connections: Vec::new(),
            disconnections: Vec::new(),
            identities: Vec::new(),
            join_requests: Vec::new(),
            joins: Vec::new(),
            messages: Vec::new(),
            inputs: Vec::new(),
            homes: Vec::new(),
            errors: Vec::new(),

            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: Event>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: Event>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_connection(&mut self, peer_key: &PeerKey) {
        self.connections.push(*peer_key);
        self.empty = false;
    }

    pub(crate) fn push_disconnection(&mut self, peer_key: &PeerKey, address: SocketAddr) {
        self.disconnections.push((*peer_key, address));
        self.empty = false;
    }

    pub(crate) fn push_identity(&mut self, peer_key: &PeerKey, name: String) {
        self.identities.push((*peer_key, name));
        self.empty = false;
    }

    pub(crate) fn push_join_request(&mut self, peer_key: &PeerKey) {
        self.join_requests.push(*peer_key);
        self.empty = false;
    }

    pub(crate) fn push_join(&mut self, peer_key: &PeerKey) {
        self.joins.push(*peer_key);
        self.empty = false;
    }

    pub(crate) fn push_message(&mut self, peer_key: &PeerKey, message: Value) {
        self.messages.push((*peer_key, message));
        self.empty = false;
    }

    pub(crate) fn push_input(
        &mut self,
        peer_key: &PeerKey,
        input: Value,
        seq: Option<InputSequence>,
    ) {
        self.inputs.push((*peer_key, input, seq));
        self.empty = false;
    }

    pub(crate) fn push_home(&mut self, peer_key: &PeerKey, delta: Delta) {
        self.homes.push((*peer_key, delta));
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: ServerError) {
        self.errors.push(error);
        self.empty = false;
    }
}

// Event Trait
pub trait Event {
    type Iter;

    fn iter(events: &mut Events) -> Self::Iter;

    fn has(events: &Events) -> bool;
}

macro_rules! event {
    ($(#[$doc:meta])* $name:ident, $field:ident, $item:ty) => {
        $(#[$doc])*
        pub struct $name;
        impl Event for $name {
            type Iter = IntoIter<$item>;

            fn iter(events: &mut Events) -> Self::Iter {
                let list = std::mem::take(&mut events.$field);
                IntoIterator::into_iter(list)
            }

            fn has(events: &Events) -> bool {
                !events.$field.is_empty()
            }
        }
    };
}

event!(
    /// A peer connected and was assigned a key
    ConnectEvent, connections, PeerKey
);
event!(
    /// A peer's connection closed; its home state is gone
    DisconnectEvent, disconnections, (PeerKey, SocketAddr)
);
event!(
    /// A peer announced its name
    IdentityEvent, identities, (PeerKey, String)
);
event!(
    /// A peer asked to join and waits for
    /// [`Server::accept_join`](crate::Server::accept_join)
    JoinRequestEvent, join_requests, PeerKey
);
event!(
    /// A peer received the full shared state and joined
    JoinEvent, joins, PeerKey
);
event!(
    /// A free-form message from a peer
    MessageEvent, messages, (PeerKey, Value)
);
event!(
    /// An input frame from a peer, with its sequence number if it sent one
    InputEvent, inputs, (PeerKey, Value, Option<InputSequence>)
);
event!(
    /// A peer updated its home state with the given delta
    HomeEvent, homes, (PeerKey, Delta)
);
event!(ErrorEvent, errors, ServerError);
