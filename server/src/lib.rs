//! # Statecast Server
//! A server that keeps the authoritative shared state, accepts peers over a
//! pluggable transport, merges each peer's updates into its private home
//! state, and streams every joined peer the relevance-scoped changes to the
//! shared state once per tick.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

pub mod transport;
pub mod shared {
    pub use statecast_shared::{
        apply, is_private_key, AutoSync, BigMap, BigMapKey, Child, ClientId, Delta, DeltaEntry,
        FnRelevance, InputSequence, KeySet, NodeKey, NodeRef, Opaque, Relevance, RelevanceError,
        StateError, StateNode, StateTree, Tick, Value, DIFF_NIL, EXACT_KEY, ROOT_NAME,
    };
}

mod codec;
mod error;
mod events;
mod peer;
mod protocol;
mod server;

pub use codec::{Codec, Compression, JsonCodec};
pub use error::{CodecError, ServerError};
pub use events::{
    ConnectEvent, DisconnectEvent, ErrorEvent, Event, Events, HomeEvent, IdentityEvent,
    InputEvent, JoinEvent, JoinRequestEvent, MessageEvent,
};
pub use peer::{Peer, PeerKey, PeerMut, PeerRef};
pub use protocol::{ClientMessage, ServerMessage};
pub use server::{Server, ServerConfig, ANY_VERSION};
