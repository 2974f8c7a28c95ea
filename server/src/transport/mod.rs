use std::net::SocketAddr;

use thiserror::Error;

mod channel;
pub use channel::{ChannelClient, ChannelConnector, ChannelSocket};

/// Something that happened on the transport since the last poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(SocketAddr),
    Packet(SocketAddr, Box<[u8]>),
    Disconnected(SocketAddr),
}

/// A connection-oriented, message-framed transport the server listens on.
///
/// `terminate` closes a peer's connection; the transport then reports a
/// [`TransportEvent::Disconnected`] for it like for any other close.
pub trait Socket: Send {
    /// Polls for the next event without blocking
    fn receive(&mut self) -> Result<Option<TransportEvent>, RecvError>;

    fn send(&mut self, address: &SocketAddr, payload: &[u8]) -> Result<(), SendError>;

    fn terminate(&mut self, address: &SocketAddr);
}

/// The transport can no longer deliver to the given peer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Transport cannot deliver packet: connection is closed")]
pub struct SendError;

/// The transport itself is gone and will produce no more events
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Transport cannot receive: all connections are closed")]
pub struct RecvError;
