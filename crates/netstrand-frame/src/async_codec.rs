//! Netstring codec for [`tokio_util::codec::FramedRead`] and
//! [`tokio_util::codec::FramedWrite`].

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{decode_frame, encode_into, FrameConfig};
use crate::error::FrameError;

/// Netstring framing for async byte streams.
///
/// Follows the same rules as [`crate::NetstringDecoder`]: a framing error
/// poisons the codec and later frames fail with [`FrameError::DecoderFailed`].
#[derive(Debug, Default)]
pub struct NetstringCodec {
    config: FrameConfig,
    failed: bool,
}

impl NetstringCodec {
    /// Create an unbounded codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit configuration.
    #[must_use]
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            config,
            failed: false,
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for NetstringCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.failed {
            return Err(FrameError::DecoderFailed);
        }
        decode_frame(src, self.config.max_payload_size).inspect_err(|err| {
            warn!(error = %err, "netstring framing violation");
            self.failed = true;
            src.clear();
        })
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(payload) => Ok(Some(payload)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for NetstringCodec {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.as_ref();
        if let Some(max) = self.config.max_payload_size {
            if payload.len() > max {
                return Err(FrameError::FrameTooLarge {
                    size: payload.len(),
                    max,
                });
            }
        }
        encode_into(payload, dst);
        Ok(())
    }
}
