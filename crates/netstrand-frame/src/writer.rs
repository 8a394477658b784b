use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_parts_into, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete netstring frames to any `Write` stream.
///
/// Each frame is written whole and flushed before `send` returns, so frames
/// reach the peer in call order.
pub struct NetstringWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> NetstringWriter<T> {
    /// Create a new writer with default (unbounded) configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one payload.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.send_parts(&[payload])
    }

    /// Encode and send one frame whose payload is the concatenation of `parts`.
    pub fn send_parts(&mut self, parts: &[&[u8]]) -> Result<()> {
        let size: usize = parts.iter().map(|p| p.len()).sum();
        if let Some(max) = self.config.max_payload_size {
            if size > max {
                return Err(FrameError::FrameTooLarge { size, max });
            }
        }

        self.buf.clear();
        encode_parts_into(parts, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: Option<usize>) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
