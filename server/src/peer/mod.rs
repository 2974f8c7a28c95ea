mod peer;
mod peer_ref;

pub use peer::{Peer, PeerKey};
pub use peer_ref::{PeerMut, PeerRef};
