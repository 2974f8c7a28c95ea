mod compression;
mod json;

pub use compression::Compression;
pub use json::JsonCodec;

use crate::{
    error::CodecError,
    protocol::{ClientMessage, ServerMessage},
};

/// Turns protocol messages into packet payloads and back
pub trait Codec: Send {
    fn encode(&self, message: &ServerMessage) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, payload: &[u8]) -> Result<ClientMessage, CodecError>;
}
