use std::io::{ErrorKind, Read};

use bytes::Bytes;
use tracing::trace;

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::stream::NetstringDecoder;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete netstring payloads from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete payloads.
pub struct NetstringReader<T> {
    inner: T,
    decoder: NetstringDecoder,
}

impl<T: Read> NetstringReader<T> {
    /// Create a new reader with default (unbounded) configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: NetstringDecoder::with_config(config),
        }
    }

    /// Read the next complete payload (blocking).
    ///
    /// Returns `Ok(None)` at a clean end of stream and
    /// `Err(FrameError::ConnectionClosed)` if the stream ends mid-frame.
    pub fn read_payload(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(payload) = self.decoder.next_payload()? {
                return Ok(Some(payload));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.decoder.finish()?;
                return Ok(None);
            }

            trace!(size = read, "read chunk");
            self.decoder.extend(&chunk[..read])?;
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: Option<usize>) {
        self.decoder.set_max_payload_size(max_payload_size);
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.decoder.config()
    }
}
