use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Separates the decimal length from the payload.
pub const LENGTH_SEPARATOR: u8 = b':';

/// Terminates every frame.
pub const FRAME_TERMINATOR: u8 = b',';

/// Longest length prefix echoed back in an `InvalidFraming` error.
const PREFIX_PREVIEW_LEN: usize = 32;

/// Configuration for netstring decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum accepted payload size in bytes. `None` means unbounded.
    pub max_payload_size: Option<usize>,
}

impl FrameConfig {
    /// A configuration rejecting payloads larger than `max_payload_size`.
    pub fn bounded(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: Some(max_payload_size),
        }
    }
}

/// Outcome of decoding a whole buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeResult {
    /// Complete payloads in wire order. Empty payloads are kept.
    pub payloads: Vec<Bytes>,
    /// Unconsumed start of an incomplete frame, verbatim.
    pub leftover: Bytes,
}

/// Encode a payload as a netstring.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬─────┬──────────────────┬─────┐
/// │ length (ASCII dec) │ ':' │ payload (length) │ ',' │
/// └────────────────────┴─────┴──────────────────┴─────┘
/// ```
/// The length counts bytes, not characters.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut dst = BytesMut::new();
    encode_into(payload, &mut dst);
    dst.freeze()
}

/// Append the netstring encoding of `payload` to `dst`.
pub fn encode_into(payload: &[u8], dst: &mut BytesMut) {
    encode_parts_into(&[payload], dst);
}

/// Encode one frame whose payload is the concatenation of `parts`.
pub fn encode_parts(parts: &[&[u8]]) -> Bytes {
    let mut dst = BytesMut::new();
    encode_parts_into(parts, &mut dst);
    dst.freeze()
}

pub(crate) fn encode_parts_into(parts: &[&[u8]], dst: &mut BytesMut) {
    let size: usize = parts.iter().map(|p| p.len()).sum();
    let prefix = size.to_string();
    dst.reserve(prefix.len() + size + 2);
    dst.put_slice(prefix.as_bytes());
    dst.put_u8(LENGTH_SEPARATOR);
    for part in parts {
        dst.put_slice(part);
    }
    dst.put_u8(FRAME_TERMINATOR);
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` and leaves `src` untouched if the buffer does not hold a
/// complete frame yet. On success, consumes the frame bytes from the buffer.
/// The size limit is checked as soon as the length prefix is readable, before
/// the payload arrives.
pub fn decode_frame(src: &mut BytesMut, max_payload: Option<usize>) -> Result<Option<Bytes>> {
    let Some(colon) = src.iter().position(|&b| b == LENGTH_SEPARATOR) else {
        // A prefix can be rejected before its separator arrives; more digits
        // never make the declared length smaller.
        if !src.is_empty() {
            let size = parse_length(&src[..])?;
            check_limit(size, max_payload)?;
        }
        return Ok(None); // Need more data
    };

    let size = parse_length(&src[..colon])?;
    check_limit(size, max_payload)?;

    let Some(terminator) = colon
        .checked_add(1)
        .and_then(|start| start.checked_add(size))
    else {
        return Err(FrameError::FrameTooLarge {
            size,
            max: usize::MAX - colon - 2,
        });
    };

    if src.len() <= terminator {
        return Ok(None); // Need more data
    }

    let found = src[terminator];
    if found != FRAME_TERMINATOR {
        return Err(FrameError::MalformedFrame { found });
    }

    src.advance(colon + 1);
    let payload = src.split_to(size).freeze();
    src.advance(1);

    Ok(Some(payload))
}

/// Decode every complete frame in `buffer`.
///
/// Pure: the trailing incomplete frame (if any) is returned as `leftover` for
/// the caller to prepend to the next chunk.
///
/// The length prefix is validated even before its `:` arrives: `b"12x"` is
/// `InvalidFraming` rather than a three-byte leftover, and a prefix already
/// above `max_payload` is `FrameTooLarge`. Leftover therefore never holds more
/// than one frame's worth of bytes.
pub fn decode(buffer: &[u8], max_payload: Option<usize>) -> Result<DecodeResult> {
    let mut src = BytesMut::from(buffer);
    let mut payloads = Vec::new();
    while let Some(payload) = decode_frame(&mut src, max_payload)? {
        payloads.push(payload);
    }
    Ok(DecodeResult {
        payloads,
        leftover: src.freeze(),
    })
}

fn check_limit(size: usize, max_payload: Option<usize>) -> Result<()> {
    match max_payload {
        Some(max) if size > max => Err(FrameError::FrameTooLarge { size, max }),
        _ => Ok(()),
    }
}

fn parse_length(prefix: &[u8]) -> Result<usize> {
    let invalid = || FrameError::InvalidFraming {
        prefix: String::from_utf8_lossy(&prefix[..prefix.len().min(PREFIX_PREVIEW_LEN)])
            .into_owned(),
    };

    if prefix.is_empty() {
        return Err(invalid());
    }

    prefix.iter().try_fold(0usize, |acc, &b| {
        if !b.is_ascii_digit() {
            return Err(invalid());
        }
        acc.checked_mul(10)
            .and_then(|v| v.checked_add(usize::from(b - b'0')))
            .ok_or_else(invalid)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_writes_byte_length() {
        assert_eq!(encode(b"hello").as_ref(), b"5:hello,");
        assert_eq!(encode(b"").as_ref(), b"0:,");
        assert_eq!(encode("é".as_bytes()).as_ref(), "2:é,".as_bytes());
    }

    #[test]
    fn encode_parts_sums_lengths() {
        let framed = encode_parts(&[&b"?"[..], &b"command"[..]]);
        assert_eq!(framed.as_ref(), b"8:?command,");
        assert_eq!(encode_parts(&[]).as_ref(), b"0:,");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = b"hello, netstrand!";
        let result = decode(&encode(payload), None).unwrap();
        assert_eq!(result.payloads.len(), 1);
        assert_eq!(result.payloads[0].as_ref(), payload);
        assert!(result.leftover.is_empty());
    }

    #[test]
    fn test_empty_payload_is_a_frame() {
        let result = decode(b"0:,", None).unwrap();
        assert_eq!(result.payloads.len(), 1);
        assert!(result.payloads[0].is_empty());
        assert!(result.leftover.is_empty());
    }

    #[test]
    fn test_multiple_frames() {
        let result = decode(b"5:first,6:second,0:,", None).unwrap();
        let payloads: Vec<&[u8]> = result.payloads.iter().map(|p| p.as_ref()).collect();
        assert_eq!(payloads, vec![&b"first"[..], &b"second"[..], &b""[..]]);
        assert!(result.leftover.is_empty());
    }

    #[test]
    fn test_decode_incomplete_prefix() {
        let result = decode(b"12", None).unwrap();
        assert!(result.payloads.is_empty());
        assert_eq!(result.leftover.as_ref(), b"12");
    }

    #[test]
    fn test_decode_incomplete_payload_keeps_leftover_verbatim() {
        let result = decode(b"5:hel", None).unwrap();
        assert!(result.payloads.is_empty());
        assert_eq!(result.leftover.as_ref(), b"5:hel");

        let result = decode(b"2:ab,5:hel", None).unwrap();
        assert_eq!(result.payloads[0].as_ref(), b"ab");
        assert_eq!(result.leftover.as_ref(), b"5:hel");
    }

    #[test]
    fn test_decode_missing_terminator_waits() {
        let result = decode(b"1:a", None).unwrap();
        assert!(result.payloads.is_empty());
        assert_eq!(result.leftover.as_ref(), b"1:a");
    }

    #[test]
    fn test_decode_malformed_terminator() {
        let err = decode(b"1:ab", None).unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame { found: b'b' }));
    }

    #[test]
    fn test_decode_invalid_length() {
        assert!(matches!(
            decode(b"a:", None),
            Err(FrameError::InvalidFraming { .. })
        ));
        assert!(matches!(
            decode(b"-1:", None),
            Err(FrameError::InvalidFraming { .. })
        ));
        assert!(matches!(
            decode(b"+1:a,", None),
            Err(FrameError::InvalidFraming { .. })
        ));
        assert!(matches!(
            decode(b":,", None),
            Err(FrameError::InvalidFraming { .. })
        ));
        assert!(matches!(
            decode(b"99999999999999999999999:", None),
            Err(FrameError::InvalidFraming { .. })
        ));
    }

    #[test]
    fn test_invalid_prefix_rejected_before_separator() {
        assert!(matches!(
            decode(b"12x", None),
            Err(FrameError::InvalidFraming { .. })
        ));
        assert!(matches!(
            decode(b"99999999999999999999999", None),
            Err(FrameError::InvalidFraming { .. })
        ));
    }

    #[test]
    fn test_oversized_prefix_rejected_before_separator() {
        let err = decode(b"100", Some(16)).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 100, max: 16 }));
        assert!(decode(b"1", Some(16)).unwrap().payloads.is_empty());
    }

    #[test]
    fn test_invalid_prefix_preview_is_bounded() {
        let mut wire = vec![b'x'; 100];
        wire.push(b':');
        match decode(&wire, None).unwrap_err() {
            FrameError::InvalidFraming { prefix } => assert_eq!(prefix.len(), PREFIX_PREVIEW_LEN),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_leading_zeros_accepted() {
        let result = decode(b"01:a,", None).unwrap();
        assert_eq!(result.payloads[0].as_ref(), b"a");
    }

    #[test]
    fn test_payload_too_large_before_payload_arrives() {
        let err = decode(b"26:x", Some(25)).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 26, max: 25 }));
    }

    #[test]
    fn test_limit_is_inclusive() {
        let payload = vec![b'z'; 25];
        let result = decode(&encode(&payload), Some(25)).unwrap();
        assert_eq!(result.payloads[0].len(), 25);
    }

    #[test]
    fn test_non_ascii_roundtrip() {
        let six_chars = "Hello\u{e9}";
        assert_eq!(six_chars.chars().count(), 6);
        assert_eq!(six_chars.len(), 7);

        let emoji = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}\u{200D}\u{1F466}";
        assert_eq!(emoji.encode_utf16().count(), 11);
        assert_eq!(emoji.len(), 25);

        for text in [six_chars, emoji] {
            let framed = encode(text.as_bytes());
            assert!(framed.starts_with(format!("{}:", text.len()).as_bytes()));
            let result = decode(&framed, None).unwrap();
            assert_eq!(result.payloads[0].as_ref(), text.as_bytes());
        }
    }

    #[test]
    fn test_decode_frame_consumes_only_one_frame() {
        let mut buf = BytesMut::from(&b"1:a,1:b,"[..]);
        let first = decode_frame(&mut buf, None).unwrap().unwrap();
        assert_eq!(first.as_ref(), b"a");
        assert_eq!(buf.as_ref(), b"1:b,");
    }

    #[test]
    fn test_decode_frame_incomplete_leaves_buffer() {
        let mut buf = BytesMut::from(&b"4:ab"[..]);
        assert!(decode_frame(&mut buf, None).unwrap().is_none());
        assert_eq!(buf.as_ref(), b"4:ab");
    }

    #[test]
    fn frame_config_bounded() {
        assert_eq!(FrameConfig::default().max_payload_size, None);
        assert_eq!(FrameConfig::bounded(16).max_payload_size, Some(16));
    }
}
