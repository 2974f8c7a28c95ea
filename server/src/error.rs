use std::net::SocketAddr;

use thiserror::Error;

use statecast_shared::StateError;

use crate::{
    transport::{RecvError, SendError},
    PeerKey,
};

/// Errors that can occur while encoding or decoding packet payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The message could not be serialized
    #[error("Failed to encode message: {reason}")]
    Encode { reason: String },

    /// The payload is not a valid message (SECURITY: potentially malicious packet)
    #[error("Failed to decode payload of {payload_size} bytes: {reason}")]
    Decode { payload_size: usize, reason: String },

    /// Compression operation failed
    #[error("Failed to compress payload of {payload_size} bytes")]
    CompressionFailed { payload_size: usize },

    /// Decompression operation failed (SECURITY: potentially malformed or malicious data)
    #[error("Failed to decompress payload of {payload_size} bytes (possible malformed or malicious data)")]
    DecompressionFailed { payload_size: usize },
}

/// Errors reported by the [`Server`](crate::Server), either returned from a
/// call or collected as an [`ErrorEvent`](crate::ErrorEvent)
#[derive(Debug, Error)]
pub enum ServerError {
    /// No socket has been given to [`Server::listen`](crate::Server::listen)
    #[error("Server is not listening on any socket")]
    NotListening,

    /// The key does not belong to a connected peer
    #[error("No peer exists for key {key:?}")]
    PeerNotFound { key: PeerKey },

    /// A packet could not be delivered
    #[error("Failed to send packet to {address}: {source}")]
    Send {
        address: SocketAddr,
        #[source]
        source: SendError,
    },

    /// The transport stopped producing events
    #[error("Transport error: {0}")]
    Recv(#[from] RecvError),

    /// An outgoing message could not be encoded
    #[error("Failed to encode outgoing message: {0}")]
    Encode(#[source] CodecError),

    /// A received packet could not be decoded and was dropped
    #[error("Dropped packet from {address}: {source}")]
    Decode {
        address: SocketAddr,
        #[source]
        source: CodecError,
    },

    /// The shared state tree rejected an operation
    #[error("State error: {0}")]
    State(#[from] StateError),
}
