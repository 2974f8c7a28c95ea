use crate::{
    error::CodecError,
    protocol::{ClientMessage, ServerMessage},
};

use super::Codec;

/// JSON payloads, one message per packet
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, message: &ServerMessage) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(message).map_err(|error| CodecError::Encode {
            reason: error.to_string(),
        })
    }

    fn decode(&self, payload: &[u8]) -> Result<ClientMessage, CodecError> {
        serde_json::from_slice(payload).map_err(|error| CodecError::Decode {
            payload_size: payload.len(),
            reason: error.to_string(),
        })
    }
}
