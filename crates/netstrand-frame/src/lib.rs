//! Netstring framing and incremental line splitting.
//!
//! Every message on the wire is a netstring:
//! - the payload byte length in ASCII decimal
//! - a `:` separator
//! - the payload bytes
//! - a `,` terminator
//!
//! Decoders are incremental: feed arbitrary chunks, get whole payloads back,
//! with at most one incomplete frame buffered in between.

pub mod bytecodec;
pub mod codec;
pub mod error;
pub mod lines;
pub mod reader;
pub mod stream;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use bytecodec::TextEncoding;
pub use codec::{
    decode, decode_frame, encode, encode_into, encode_parts, DecodeResult, FrameConfig,
    FRAME_TERMINATOR, LENGTH_SEPARATOR,
};
pub use error::{FrameError, Result};
pub use lines::{Delimiter, DelimiterBytes, LineSplitter, SplitReader, TextLines};
pub use reader::NetstringReader;
pub use stream::{NetstringDecoder, NetstringEncoder, Payloads};
pub use writer::NetstringWriter;

#[cfg(feature = "async")]
pub use async_codec::NetstringCodec;
