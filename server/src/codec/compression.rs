cfg_if! {
    if #[cfg(feature = "zstd_support")]
    {
        use log::trace;

        use crate::error::CodecError;

        // Upper bound on a decompressed packet
        const MAX_PAYLOAD_SIZE: usize = 1 << 20;

        /// Whole-payload zstd compression, applied after encoding and
        /// before decoding when enabled
        pub struct Compression {
            enabled: bool,
        }

        impl Compression {
            pub fn new(enabled: bool) -> Self {
                Self { enabled }
            }

            pub fn is_enabled(&self) -> bool {
                self.enabled
            }

            pub fn compress(&self, payload: Vec<u8>) -> Result<Vec<u8>, CodecError> {
                if !self.enabled {
                    return Ok(payload);
                }
                let compressed = zstd::bulk::compress(&payload, zstd::DEFAULT_COMPRESSION_LEVEL)
                    .map_err(|_| CodecError::CompressionFailed {
                        payload_size: payload.len(),
                    })?;
                trace!("compressed {} bytes into {}", payload.len(), compressed.len());
                Ok(compressed)
            }

            /// SECURITY: input comes straight off the network; malformed or
            /// oversized payloads return an error
            pub fn decompress(&self, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
                if !self.enabled {
                    return Ok(payload.to_vec());
                }
                zstd::bulk::decompress(payload, MAX_PAYLOAD_SIZE).map_err(|_| {
                    CodecError::DecompressionFailed {
                        payload_size: payload.len(),
                    }
                })
            }
        }
    }
    else
    {
        use log::warn;

        use crate::error::CodecError;

        pub struct Compression;

        impl Compression {
            pub fn new(enabled: bool) -> Self {
                if enabled {
                    warn!("compression requested but the `zstd_support` feature is off, payloads stay uncompressed");
                }
                Self
            }

            pub fn is_enabled(&self) -> bool {
                false
            }

            pub fn compress(&self, payload: Vec<u8>) -> Result<Vec<u8>, CodecError> {
                Ok(payload)
            }

            pub fn decompress(&self, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
                Ok(payload.to_vec())
            }
        }
    }
}
