//! Byte/string conversion helpers shared by the codecs.

use std::fmt;
use std::str::FromStr;

use bytes::{Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Text encodings accepted for string delimiters and decoded lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Latin1,
}

impl TextEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16Le => "utf-16le",
            Self::Latin1 => "latin1",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            "latin1" | "binary" => Ok(Self::Latin1),
            other => Err(format!("unsupported text encoding: {other}")),
        }
    }
}

/// UTF-8 bytes of `text`.
pub fn utf8_encode(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}

/// Borrow `bytes` as UTF-8 text.
pub fn utf8_decode(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| FrameError::InvalidText {
        encoding: TextEncoding::Utf8.label(),
    })
}

/// Encode `text` with `encoding`.
///
/// Latin-1 fails for characters above U+00FF.
pub fn encode_text(text: &str, encoding: TextEncoding) -> Result<Bytes> {
    match encoding {
        TextEncoding::Utf8 => Ok(utf8_encode(text)),
        TextEncoding::Utf16Le => Ok(text
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect::<Vec<u8>>()
            .into()),
        TextEncoding::Latin1 => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map(Bytes::from)
            .map_err(|_| FrameError::InvalidText {
                encoding: encoding.label(),
            }),
    }
}

/// Decode `bytes` as `encoding` text.
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> Result<String> {
    let invalid = || FrameError::InvalidText {
        encoding: encoding.label(),
    };
    match encoding {
        TextEncoding::Utf8 => utf8_decode(bytes).map(str::to_owned),
        TextEncoding::Utf16Le => {
            if bytes.len() % 2 != 0 {
                return Err(invalid());
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|_| invalid())
        }
        TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Concatenate byte slices into one buffer.
pub fn concat(parts: &[&[u8]]) -> Bytes {
    let total = parts.iter().map(|p| p.len()).sum();
    let mut out = BytesMut::with_capacity(total);
    for part in parts {
        out.extend_from_slice(part);
    }
    out.freeze()
}

/// Lowercase hex rendering of `bytes`.
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Parse hex text (either case) into bytes.
pub fn hex_decode(text: &str) -> Result<Bytes> {
    Ok(hex::decode(text)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_byte_length_differs_from_char_count() {
        let text = "héllo!";
        assert_eq!(text.chars().count(), 6);
        assert_eq!(utf8_encode(text).len(), 7);
        assert_eq!(utf8_decode(&utf8_encode(text)).unwrap(), text);
    }

    #[test]
    fn utf8_decode_rejects_invalid() {
        let err = utf8_decode(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, FrameError::InvalidText { encoding: "utf-8" }));
    }

    #[test]
    fn utf16le_roundtrip() {
        let bytes = encode_text("\r\n", TextEncoding::Utf16Le).unwrap();
        assert_eq!(bytes.as_ref(), &[0x0d, 0x00, 0x0a, 0x00]);
        assert_eq!(decode_text(&bytes, TextEncoding::Utf16Le).unwrap(), "\r\n");
    }

    #[test]
    fn utf16le_rejects_odd_length() {
        assert!(decode_text(&[0x41], TextEncoding::Utf16Le).is_err());
    }

    #[test]
    fn latin1_rejects_wide_chars() {
        assert_eq!(
            encode_text("é", TextEncoding::Latin1).unwrap().as_ref(),
            &[0xe9]
        );
        assert!(encode_text("€", TextEncoding::Latin1).is_err());
        assert_eq!(decode_text(&[0xe9], TextEncoding::Latin1).unwrap(), "é");
    }

    #[test]
    fn concat_joins_in_order() {
        assert_eq!(concat(&[&b"ab"[..], &b""[..], &b"cd"[..]]).as_ref(), b"abcd");
        assert!(concat(&[]).is_empty());
    }

    #[test]
    fn hex_roundtrip_and_errors() {
        assert_eq!(hex_encode(b"\x00\xffA"), "00ff41");
        assert_eq!(hex_decode("00FF41").unwrap().as_ref(), b"\x00\xffA");
        assert!(matches!(hex_decode("abc"), Err(FrameError::InvalidHex(_))));
        assert!(matches!(hex_decode("zz"), Err(FrameError::InvalidHex(_))));
    }

    #[test]
    fn encoding_labels_parse() {
        assert_eq!("UTF-8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert_eq!("ucs2".parse::<TextEncoding>().unwrap(), TextEncoding::Utf16Le);
        assert_eq!("binary".parse::<TextEncoding>().unwrap(), TextEncoding::Latin1);
        assert!("ebcdic".parse::<TextEncoding>().is_err());
    }
}
