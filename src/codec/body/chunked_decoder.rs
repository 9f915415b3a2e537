//! Decoder for chunked transfer encoding, as specified in
//! [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).
//!
//! Wire shape per chunk: `<hex-size>[;ext]CRLF<data>CRLF`, terminated by a
//! zero-size chunk followed by optional trailer lines and a final CRLF.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

/// Cap on chunk-size, extension and trailer line lengths. A line running
/// past this is a resource-limit failure, not a syntax failure.
const MAX_CHUNK_LINE_BYTES: usize = 4096;

/// State machine over the chunked wire syntax.
///
/// The chunk size is accumulated with checked arithmetic, so an absurdly
/// large hex size fails instead of wrapping. After the terminal chunk the
/// read buffer is positioned exactly at the first byte of the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    /// Remaining bytes of the current chunk; doubles as the size
    /// accumulator while reading the size line.
    remaining: u64,
    /// Bytes consumed from the current extension or trailer line.
    line_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading the hex chunk size.
    Size,
    /// Whitespace between size and extension/CR.
    SizeLws,
    /// Skipping a chunk extension.
    Extension,
    /// Expecting LF ending the size line.
    SizeLf,
    /// Reading chunk data.
    Data,
    /// Expecting CR after chunk data.
    DataCr,
    /// Expecting LF after chunk data.
    DataLf,
    /// Skipping a trailer line.
    Trailer,
    /// Expecting LF ending a trailer line.
    TrailerLf,
    /// Expecting the final CR.
    EndCr,
    /// Expecting the final LF.
    EndLf,
    /// Terminal chunk fully consumed.
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size, remaining: 0, line_bytes: 0 }
    }

    /// Consumes one byte and returns the next state.
    fn advance(&mut self, byte: u8) -> Result<State, ParseError> {
        match self.state {
            State::Size => match byte {
                b'0'..=b'9' => self.accumulate(byte - b'0'),
                b'a'..=b'f' => self.accumulate(byte - b'a' + 10),
                b'A'..=b'F' => self.accumulate(byte - b'A' + 10),
                b'\t' | b' ' => Ok(State::SizeLws),
                b';' => Ok(State::Extension),
                b'\r' => Ok(State::SizeLf),
                _ => Err(ParseError::invalid_chunk("invalid character in chunk size")),
            },

            State::SizeLws => match byte {
                b'\t' | b' ' => Ok(State::SizeLws),
                b';' => Ok(State::Extension),
                b'\r' => Ok(State::SizeLf),
                _ => Err(ParseError::invalid_chunk("invalid chunk size line")),
            },

            // extensions are ignored, but a bare LF inside one is rejected
            // to keep lenient peers honest
            State::Extension => match byte {
                b'\r' => Ok(State::SizeLf),
                b'\n' => Err(ParseError::invalid_chunk("bare LF in chunk extension")),
                _ => self.count_line_byte(State::Extension),
            },

            State::SizeLf => match byte {
                b'\n' => {
                    self.line_bytes = 0;
                    if self.remaining == 0 { Ok(State::EndCr) } else { Ok(State::Data) }
                }
                _ => Err(ParseError::invalid_chunk("missing LF after chunk size")),
            },

            State::Data => unreachable!("chunk data is consumed in bulk"),

            State::DataCr => match byte {
                b'\r' => Ok(State::DataLf),
                _ => Err(ParseError::invalid_chunk("missing CR after chunk data")),
            },

            State::DataLf => match byte {
                b'\n' => Ok(State::Size),
                _ => Err(ParseError::invalid_chunk("missing LF after chunk data")),
            },

            State::Trailer => match byte {
                b'\r' => Ok(State::TrailerLf),
                b'\n' => Err(ParseError::invalid_chunk("bare LF in trailer")),
                _ => self.count_line_byte(State::Trailer),
            },

            State::TrailerLf => match byte {
                b'\n' => {
                    self.line_bytes = 0;
                    Ok(State::EndCr)
                }
                _ => Err(ParseError::invalid_chunk("missing LF after trailer")),
            },

            State::EndCr => match byte {
                b'\r' => Ok(State::EndLf),
                // a trailer line instead of the final CRLF
                _ => self.count_line_byte(State::Trailer),
            },

            State::EndLf => match byte {
                b'\n' => Ok(State::Done),
                _ => Err(ParseError::invalid_chunk("missing final LF")),
            },

            State::Done => Ok(State::Done),
        }
    }

    fn accumulate(&mut self, digit: u8) -> Result<State, ParseError> {
        self.remaining = self
            .remaining
            .checked_mul(16)
            .and_then(|size| size.checked_add(u64::from(digit)))
            .ok_or_else(|| ParseError::invalid_chunk("chunk size overflow"))?;
        Ok(State::Size)
    }

    fn count_line_byte(&mut self, next: State) -> Result<State, ParseError> {
        self.line_bytes += 1;
        if self.line_bytes > MAX_CHUNK_LINE_BYTES {
            return Err(ParseError::line_too_long(MAX_CHUNK_LINE_BYTES));
        }
        Ok(next)
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Done => {
                    trace!("finished reading chunked body");
                    return Ok(Some(PayloadItem::Eof));
                }

                State::Data => {
                    if self.remaining == 0 {
                        self.state = State::DataCr;
                        continue;
                    }
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let len = std::cmp::min(self.remaining, src.len() as u64) as usize;
                    self.remaining -= len as u64;
                    if self.remaining == 0 {
                        self.state = State::DataCr;
                    }

                    let bytes = src.split_to(len).freeze();
                    trace!(len = bytes.len(), "read chunked bytes");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                _ => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let byte = src.get_u8();
                    self.state = self.advance(byte)?;
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::truncated("chunked body")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn single_chunk_then_eof() {
        let mut buffer: BytesMut = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(item.is_chunk());
        assert_eq!(&item.into_bytes().unwrap()[..], b"1234567890abcdef");

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(buffer.is_empty());
    }

    #[test]
    fn multiple_chunks() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b", world"));

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn chunk_extensions_are_skipped() {
        let mut buffer: BytesMut = BytesMut::from(&b"5;chunk-ext=value\r\nhello\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn trailers_are_consumed() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\r\n0\r\nTrailer: value\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(buffer.is_empty());
    }

    #[test]
    fn incomplete_chunk_resumes() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hel"));

        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r\n0\r\n\r\n");

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"lo"));

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn non_hex_size_fails() {
        let mut buffer: BytesMut = BytesMut::from(&b"zzz\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidChunk { .. })));
    }

    #[test]
    fn overflowing_size_fails() {
        let mut buffer: BytesMut = BytesMut::from(&b"FFFFFFFFFFFFFFFFF\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidChunk { .. })));
    }

    #[test]
    fn missing_crlf_after_data_fails() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn oversized_extension_is_a_resource_limit_failure() {
        let mut data = Vec::from(&b"5;"[..]);
        data.extend(std::iter::repeat_n(b'a', MAX_CHUNK_LINE_BYTES + 1));
        let mut buffer = BytesMut::from(&data[..]);
        let mut decoder = ChunkedDecoder::new();

        match decoder.decode(&mut buffer) {
            Err(e) => assert!(e.is_resource_limit()),
            Ok(_) => panic!("expected a line-too-long failure"),
        }
    }

    #[test]
    fn zero_size_chunk_is_eof() {
        let mut buffer: BytesMut = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn truncated_stream_fails_at_eof() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhe"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"he"));

        assert!(matches!(decoder.decode_eof(&mut buffer), Err(ParseError::Truncated { .. })));
    }

    #[test]
    fn large_chunk_spanning_reads() {
        let size = 1024 * 1024;
        let mut data = Vec::with_capacity(size + 16);
        data.extend(format!("{size:x}\r\n").into_bytes());
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let mut buffer = BytesMut::from(&data[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        let bytes = chunk.into_bytes().unwrap();
        assert_eq!(bytes.len(), size);
        assert!(bytes.iter().all(|&b| b == b'A'));

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }
}
