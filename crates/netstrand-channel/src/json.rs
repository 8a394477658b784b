//! One JSON array per netstring payload.
//!
//! The encoding side insists on a top-level array. The decoding side parses
//! whatever JSON the peer framed and leaves shape checks to the caller.

use std::io::{Read, Write};
use std::iter::FusedIterator;

use bytes::Bytes;
use netstrand_frame::{
    FrameConfig, FrameError, NetstringDecoder, NetstringEncoder, NetstringReader, NetstringWriter,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ChannelError, Result};

/// Convert `message` to a JSON value, rejecting anything but an array.
pub fn to_message<T: Serialize + ?Sized>(message: &T) -> Result<Value> {
    let value = serde_json::to_value(message)?;
    if !value.is_array() {
        return Err(ChannelError::NotAnArray {
            found: json_kind(&value),
        });
    }
    Ok(value)
}

/// Serialize one message to its UTF-8 JSON payload (unframed).
pub fn encode_message<T: Serialize + ?Sized>(message: &T) -> Result<Bytes> {
    let value = to_message(message)?;
    Ok(Bytes::from(serde_json::to_vec(&value)?))
}

/// Parse one payload as JSON.
pub fn decode_message(payload: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(payload)?)
}

/// Name of a JSON value's type, for error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Frames messages into netstring bytes.
#[derive(Debug, Default)]
pub struct MessageEncoder {
    frames: NetstringEncoder,
}

impl MessageEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one message as a complete netstring frame.
    pub fn encode<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<Bytes> {
        let payload = encode_message(message)?;
        Ok(self.frames.encode(&payload))
    }
}

/// Incremental message decoder over a netstring byte stream.
///
/// Any error, framing or JSON, ends the stream. Messages returned before the
/// error stay valid.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    frames: NetstringDecoder,
    failed: bool,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            frames: NetstringDecoder::with_config(config),
            failed: false,
        }
    }

    /// Append `chunk` and iterate over every message now complete.
    pub fn feed(&mut self, chunk: &[u8]) -> Messages<'_> {
        let pending_error = self.extend(chunk).err();
        Messages {
            decoder: self,
            pending_error,
            done: false,
        }
    }

    /// Append a chunk without decoding.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<()> {
        if self.failed {
            return Err(FrameError::DecoderFailed.into());
        }
        Ok(self.frames.extend(chunk)?)
    }

    /// Pop the next complete message, if one is buffered.
    pub fn next_message(&mut self) -> Result<Option<Value>> {
        if self.failed {
            return Err(FrameError::DecoderFailed.into());
        }
        let decoded = match self.frames.next_payload() {
            Ok(Some(payload)) => decode_message(&payload).map(Some),
            Ok(None) => Ok(None),
            Err(err) => Err(err.into()),
        };
        if let Err(err) = &decoded {
            warn!(error = %err, "message stream failed");
            self.failed = true;
        }
        decoded
    }

    /// Signal end of input; fails if a partial frame is still buffered.
    pub fn finish(&mut self) -> Result<()> {
        if self.failed {
            return Err(FrameError::DecoderFailed.into());
        }
        Ok(self.frames.finish()?)
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Messages made complete by one [`MessageDecoder::feed`] call.
#[derive(Debug)]
pub struct Messages<'a> {
    decoder: &'a mut MessageDecoder,
    pending_error: Option<ChannelError>,
    done: bool,
}

impl Iterator for Messages<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(err) = self.pending_error.take() {
            self.done = true;
            return Some(Err(err));
        }
        match self.decoder.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
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

impl FusedIterator for Messages<'_> {}

/// Writes JSON-array messages to any `Write` stream.
pub struct MessageWriter<W> {
    frames: NetstringWriter<W>,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self {
            frames: NetstringWriter::with_config(inner, config),
        }
    }

    /// Serialize, frame, write and flush one message.
    pub fn send<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
        let payload = encode_message(message)?;
        self.frames.send(&payload)?;
        debug!(size = payload.len(), "sent message");
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        self.frames.get_ref()
    }

    pub fn into_inner(self) -> W {
        self.frames.into_inner()
    }
}

/// Reads messages from any `Read` stream.
pub struct MessageReader<R> {
    frames: NetstringReader<R>,
    failed: bool,
}

impl<R: Read> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: R, config: FrameConfig) -> Self {
        Self {
            frames: NetstringReader::with_config(inner, config),
            failed: false,
        }
    }

    /// Block for the next message. `Ok(None)` means the peer closed cleanly.
    pub fn recv(&mut self) -> Result<Option<Value>> {
        if self.failed {
            return Err(FrameError::DecoderFailed.into());
        }
        let received = match self.frames.read_payload() {
            Ok(Some(payload)) => decode_message(&payload).map(Some),
            Ok(None) => Ok(None),
            Err(err) => Err(err.into()),
        };
        if received.is_err() {
            self.failed = true;
        }
        received
    }

    pub fn get_ref(&self) -> &R {
        self.frames.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.frames.into_inner()
    }
}

impl<R: Read> Iterator for MessageReader<R> {
    type Item = Result<Value>;

    /// Ends at a clean close, and after yielding the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.recv().transpose()
    }
}
