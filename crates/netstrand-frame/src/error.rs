/// Errors that can occur during netstring encoding/decoding and line splitting.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is empty, signed, non-decimal or overflows.
    #[error("invalid netstring length prefix {prefix:?}")]
    InvalidFraming { prefix: String },

    /// The declared payload length exceeds the configured maximum.
    #[error("netstring payload too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The byte following the payload is not the `,` terminator.
    #[error("malformed netstring: expected ',' after payload, found 0x{found:02x}")]
    MalformedFrame { found: u8 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended with a partial frame buffered.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// Input refused: an earlier framing error left the stream unaligned.
    #[error("decoder stopped after an earlier framing error")]
    DecoderFailed,

    /// A line delimiter must contain at least one byte.
    #[error("line delimiter is empty")]
    EmptyDelimiter,

    /// Bytes are not valid text in the requested encoding.
    #[error("invalid {encoding} text")]
    InvalidText { encoding: &'static str },

    /// Hex input is malformed.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
