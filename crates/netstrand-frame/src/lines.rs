//! Incremental delimiter-based line splitting.
//!
//! Independent of netstring framing. Each emitted line keeps its trailing
//! delimiter; only the final line flushed at end of input may lack one.
//! A multi-byte delimiter may straddle a chunk boundary, so for those the
//! pending bytes are joined with the next chunk before scanning.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::bytecodec::{decode_text, encode_text, TextEncoding};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// What separates lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delimiter {
    /// A single byte, searched for directly.
    Byte(u8),
    /// Two or more bytes, searched for as a substring.
    Sequence(DelimiterBytes),
}

/// The bytes of a multi-byte [`Delimiter`]. Only built by
/// [`Delimiter::sequence`], so it always holds at least two bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterBytes(Bytes);

impl DelimiterBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for DelimiterBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::Byte(b'\n')
    }
}

impl Delimiter {
    /// Delimiter from raw bytes. A one-byte sequence becomes [`Delimiter::Byte`].
    pub fn sequence(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        match bytes.len() {
            0 => Err(FrameError::EmptyDelimiter),
            1 => Ok(Self::Byte(bytes[0])),
            _ => Ok(Self::Sequence(DelimiterBytes(bytes))),
        }
    }

    /// Delimiter from text in the given encoding.
    pub fn text(text: &str, encoding: TextEncoding) -> Result<Self> {
        Self::sequence(encode_text(text, encoding)?)
    }

    /// Delimiter length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(_) => 1,
            Self::Sequence(bytes) => bytes.0.len(),
        }
    }

    /// Always false; empty delimiters are rejected at construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn find(&self, haystack: &[u8], from: usize) -> Option<usize> {
        let tail = haystack.get(from..)?;
        let offset = match self {
            Self::Byte(byte) => tail.iter().position(|b| b == byte),
            Self::Sequence(needle) => tail
                .windows(needle.0.len())
                .position(|w| w == needle.as_bytes()),
        };
        offset.map(|o| o + from)
    }
}

/// Splits a byte stream into delimiter-terminated lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    delimiter: Delimiter,
    pending: Vec<Bytes>,
    pending_len: usize,
}

impl LineSplitter {
    /// Split on `\n`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Split on an explicit delimiter.
    pub fn with_delimiter(delimiter: Delimiter) -> Self {
        Self {
            delimiter,
            pending: Vec::new(),
            pending_len: 0,
        }
    }

    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    /// Bytes held back waiting for a delimiter.
    pub fn pending_len(&self) -> usize {
        self.pending_len
    }

    /// Consume one chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let delimiter_len = self.delimiter.len();

        let (work, mut search_from) = if delimiter_len > 1 && !self.pending.is_empty() {
            let carried = self.pending_len;
            let joined = self.take_pending(chunk);
            // Pending bytes hold no full delimiter, so only the seam needs rescanning.
            (joined, carried.saturating_sub(delimiter_len - 1))
        } else {
            (Bytes::copy_from_slice(chunk), 0)
        };

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(at) = self.delimiter.find(&work, search_from) {
            let end = at + delimiter_len;
            let line = if self.pending.is_empty() {
                work.slice(start..end)
            } else {
                self.take_pending(&work[start..end])
            };
            lines.push(line);
            start = end;
            search_from = end;
        }

        if start < work.len() {
            let rest = work.slice(start..);
            self.pending_len += rest.len();
            self.pending.push(rest);
        }

        lines
    }

    /// End of input: flush whatever is pending as a final, undelimited line.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.take_pending(&[]))
    }

    fn take_pending(&mut self, tail: &[u8]) -> Bytes {
        let mut joined = BytesMut::with_capacity(self.pending_len + tail.len());
        for part in self.pending.drain(..) {
            joined.extend_from_slice(&part);
        }
        joined.extend_from_slice(tail);
        self.pending_len = 0;
        joined.freeze()
    }
}

/// A [`LineSplitter`] that decodes each line as text when it is emitted.
///
/// Decoding never happens on partial lines, so a multi-byte character split
/// across chunks is reassembled before it is decoded.
#[derive(Debug)]
pub struct TextLines {
    splitter: LineSplitter,
    encoding: TextEncoding,
}

impl TextLines {
    pub fn new(splitter: LineSplitter, encoding: TextEncoding) -> Self {
        Self { splitter, encoding }
    }

    /// Consume one chunk and return every line it completes, decoded.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.splitter
            .push(chunk)
            .iter()
            .map(|line| decode_text(line, self.encoding))
            .collect()
    }

    /// End of input: decode and return the final undelimited line, if any.
    pub fn finish(&mut self) -> Result<Option<String>> {
        self.splitter
            .finish()
            .map(|line| decode_text(&line, self.encoding))
            .transpose()
    }
}

/// Iterates over the lines of any `Read` stream.
pub struct SplitReader<R> {
    inner: R,
    splitter: LineSplitter,
    ready: VecDeque<Bytes>,
    eof: bool,
}

impl<R: Read> SplitReader<R> {
    pub fn new(inner: R, delimiter: Delimiter) -> Self {
        Self {
            inner,
            splitter: LineSplitter::with_delimiter(delimiter),
            ready: VecDeque::new(),
            eof: false,
        }
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Iterator for SplitReader<R> {
    type Item = std::io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            if self.eof {
                return None;
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    self.ready.extend(self.splitter.finish());
                }
                Ok(n) => self.ready.extend(self.splitter.push(&chunk[..n])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.eof = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    fn split_all(splitter: &mut LineSplitter, chunks: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut out: Vec<Vec<u8>> = Vec::new();
        for chunk in chunks {
            out.extend(splitter.push(chunk).iter().map(|l| l.to_vec()));
        }
        out.extend(splitter.finish().map(|l| l.to_vec()));
        out
    }

    fn crlf() -> Delimiter {
        Delimiter::text("\r\n", TextEncoding::Utf8).unwrap()
    }

    #[test]
    fn three_lines_one_chunk() {
        let mut splitter = LineSplitter::new();
        let lines = split_all(&mut splitter, &[b"line1\nline2\nline3"]);
        assert_eq!(
            lines,
            vec![b"line1\n".to_vec(), b"line2\n".to_vec(), b"line3".to_vec()]
        );
    }

    #[test]
    fn three_lines_every_split_point() {
        let input = b"line1\nline2\nline3";
        for cut in 0..=input.len() {
            let mut splitter = LineSplitter::new();
            let lines = split_all(&mut splitter, &[&input[..cut], &input[cut..]]);
            assert_eq!(lines.len(), 3, "cut at {cut}");
            assert_eq!(lines[0], b"line1\n");
            assert_eq!(lines[2], b"line3");
        }
    }

    #[test]
    fn crlf_split_mid_delimiter() {
        let mut splitter = LineSplitter::with_delimiter(crlf());
        assert!(splitter.push(b"line1\r").is_empty());
        let lines = splitter.push(b"\nline2");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_ref(), b"line1\r\n");
        assert_eq!(splitter.finish().unwrap().as_ref(), b"line2");
    }

    #[test]
    fn crlf_every_split_point() {
        let input = b"line1\r\nline2\r\nline3";
        for cut in 0..=input.len() {
            let mut splitter = LineSplitter::with_delimiter(crlf());
            let lines = split_all(&mut splitter, &[&input[..cut], &input[cut..]]);
            assert_eq!(
                lines,
                vec![b"line1\r\n".to_vec(), b"line2\r\n".to_vec(), b"line3".to_vec()],
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn lone_cr_is_not_a_delimiter() {
        let mut splitter = LineSplitter::with_delimiter(crlf());
        let lines = split_all(&mut splitter, &[b"a\rb\r", b"c\r\n"]);
        assert_eq!(lines, vec![b"a\rb\rc\r\n".to_vec()]);
    }

    #[test]
    fn single_byte_delimiter_queues_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"par").is_empty());
        assert!(splitter.push(b"tial").is_empty());
        assert_eq!(splitter.pending_len(), 7);
        let lines = splitter.push(b" line\nnext");
        assert_eq!(lines[0].as_ref(), b"partial line\n");
        assert_eq!(splitter.pending_len(), 4);
    }

    #[test]
    fn empty_input_and_empty_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"").is_empty());
        assert!(splitter.finish().is_none());
    }

    #[test]
    fn trailing_delimiter_leaves_nothing_pending() {
        let mut splitter = LineSplitter::new();
        let lines = split_all(&mut splitter, &[b"a\n\n"]);
        assert_eq!(lines, vec![b"a\n".to_vec(), b"\n".to_vec()]);
    }

    #[test]
    fn delimiter_constructors() {
        assert_eq!(Delimiter::default(), Delimiter::Byte(b'\n'));
        assert_eq!(Delimiter::sequence(&b";"[..]).unwrap(), Delimiter::Byte(b';'));
        assert!(matches!(
            Delimiter::sequence(Bytes::new()),
            Err(FrameError::EmptyDelimiter)
        ));
        let wide = Delimiter::text("\n", TextEncoding::Utf16Le).unwrap();
        assert_eq!(wide.len(), 2);
    }

    #[test]
    fn sequence_delimiters_are_never_empty() {
        for raw in [&b""[..], b";", b"\r\n", b"--sep--"] {
            let Ok(delimiter) = Delimiter::sequence(raw) else {
                assert!(raw.is_empty());
                continue;
            };
            assert!(!delimiter.is_empty());
            assert_eq!(delimiter.len(), raw.len());
            if let Delimiter::Sequence(bytes) = &delimiter {
                assert_eq!(bytes.as_bytes(), raw);
            }

            let mut splitter = LineSplitter::with_delimiter(delimiter);
            assert!(splitter.push(b"abc").is_empty());
            assert_eq!(splitter.finish().unwrap().as_ref(), b"abc");
        }
    }

    #[test]
    fn text_lines_decode_only_complete_lines() {
        // "é" is 0xC3 0xA9; split between the two bytes.
        let mut lines = TextLines::new(LineSplitter::new(), TextEncoding::Utf8);
        assert!(lines.push(&[b'c', b'a', b'f', 0xC3]).unwrap().is_empty());
        let out = lines.push(&[0xA9, b'\n', b'x']).unwrap();
        assert_eq!(out, vec!["café\n".to_string()]);
        assert_eq!(lines.finish().unwrap(), Some("x".to_string()));
    }

    #[test]
    fn text_lines_utf16() {
        let delimiter = Delimiter::text("\n", TextEncoding::Utf16Le).unwrap();
        let mut lines = TextLines::new(
            LineSplitter::with_delimiter(delimiter),
            TextEncoding::Utf16Le,
        );
        let input = encode_text("hi\nyo", TextEncoding::Utf16Le).unwrap();
        let out = lines.push(&input).unwrap();
        assert_eq!(out, vec!["hi\n".to_string()]);
        assert_eq!(lines.finish().unwrap(), Some("yo".to_string()));
    }

    #[test]
    fn text_lines_invalid_utf8() {
        let mut lines = TextLines::new(LineSplitter::new(), TextEncoding::Utf8);
        assert!(matches!(
            lines.push(&[0xFF, b'\n']),
            Err(FrameError::InvalidText { .. })
        ));
    }

    #[test]
    fn split_reader_yields_lines() {
        let reader = SplitReader::new(Cursor::new(b"a\r\nb\r\nc".to_vec()), crlf());
        let lines: Vec<Bytes> = reader.collect::<std::io::Result<_>>().unwrap();
        let lines: Vec<&[u8]> = lines.iter().map(|l| l.as_ref()).collect();
        assert_eq!(lines, vec![&b"a\r\n"[..], &b"b\r\n"[..], &b"c"[..]]);
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_lines(
            input in prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'\r', b'\n']), 0..128),
            cuts in prop::collection::vec(any::<usize>(), 0..16),
        ) {
            let mut whole = LineSplitter::with_delimiter(crlf());
            let expected = split_all(&mut whole, &[&input]);

            let mut boundaries: Vec<usize> = cuts.iter().map(|c| c % (input.len() + 1)).collect();
            boundaries.push(0);
            boundaries.push(input.len());
            boundaries.sort_unstable();
            let chunks: Vec<&[u8]> = boundaries.windows(2).map(|w| &input[w[0]..w[1]]).collect();

            let mut pieces = LineSplitter::with_delimiter(crlf());
            let got = split_all(&mut pieces, &chunks);

            prop_assert_eq!(got.concat(), input.clone());
            prop_assert_eq!(got, expected);
        }
    }
}
