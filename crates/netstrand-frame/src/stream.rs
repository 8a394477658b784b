//! Incremental netstring encoder and decoder.
//!
//! The decoder is a small state machine: it owns the leftover bytes of the
//! current incomplete frame and turns each incoming chunk into zero or more
//! payloads. It is not shared; one decoder serves exactly one byte stream.

use std::iter::FusedIterator;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::codec::{decode_frame, encode_into, encode_parts_into, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Frames each chunk it is given, one frame per call.
///
/// An empty chunk still produces a `0:,` frame.
#[derive(Debug, Default)]
pub struct NetstringEncoder {
    buf: BytesMut,
}

impl NetstringEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one payload into a frame.
    pub fn encode(&mut self, chunk: &[u8]) -> Bytes {
        encode_into(chunk, &mut self.buf);
        self.buf.split().freeze()
    }

    /// Encode the concatenation of `parts` as one frame.
    pub fn encode_parts(&mut self, parts: &[&[u8]]) -> Bytes {
        encode_parts_into(parts, &mut self.buf);
        self.buf.split().freeze()
    }
}

/// Stateful netstring decoder with a persistent leftover buffer.
///
/// A framing error is terminal: it is returned once, the buffer is dropped,
/// and every later call fails with [`FrameError::DecoderFailed`].
#[derive(Debug)]
pub struct NetstringDecoder {
    buf: BytesMut,
    config: FrameConfig,
    failed: bool,
}

impl Default for NetstringDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NetstringDecoder {
    /// Create an unbounded decoder.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            failed: false,
        }
    }

    /// Append a chunk to the leftover buffer without decoding.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<()> {
        if self.failed {
            return Err(FrameError::DecoderFailed);
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Pop the next complete payload, if the buffer holds one.
    pub fn next_payload(&mut self) -> Result<Option<Bytes>> {
        if self.failed {
            return Err(FrameError::DecoderFailed);
        }
        match decode_frame(&mut self.buf, self.config.max_payload_size) {
            Ok(Some(payload)) => {
                debug!(size = payload.len(), "decoded netstring payload");
                Ok(Some(payload))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                warn!(error = %err, buffered = self.buf.len(), "netstring framing violation");
                self.failed = true;
                self.buf.clear();
                Err(err)
            }
        }
    }

    /// Append `chunk` and iterate over every payload now complete.
    ///
    /// The iterator yields payloads in wire order and stops after the first
    /// error. Payloads yielded before an error stay valid. Dropping the
    /// iterator early leaves undecoded frames buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Payloads<'_> {
        let pending_error = self.extend(chunk).err();
        Payloads {
            decoder: self,
            pending_error,
            done: false,
        }
    }

    /// Signal end of input.
    ///
    /// Fails with [`FrameError::ConnectionClosed`] if a partial frame is
    /// still buffered.
    pub fn finish(&mut self) -> Result<()> {
        if self.failed {
            return Err(FrameError::DecoderFailed);
        }
        if !self.buf.is_empty() {
            return Err(FrameError::ConnectionClosed);
        }
        Ok(())
    }

    /// Bytes held back for an incomplete frame.
    pub fn leftover(&self) -> &[u8] {
        &self.buf
    }

    /// Whether a framing error has poisoned this decoder.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: Option<usize>) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Payloads made complete by one [`NetstringDecoder::feed`] call.
#[derive(Debug)]
pub struct Payloads<'a> {
    decoder: &'a mut NetstringDecoder,
    pending_error: Option<FrameError>,
    done: bool,
}

impl Iterator for Payloads<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(err) = self.pending_error.take() {
            self.done = true;
            return Some(Err(err));
        }
        match self.decoder.next_payload() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for Payloads<'_> {}
