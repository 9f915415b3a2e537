//! Decoder for bodies delimited by a Content-Length header, as defined in
//! [RFC 7230 Section 3.3.2](https://tools.ietf.org/html/rfc7230#section-3.3.2).

use std::cmp;

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Tracks the remaining declared body bytes and never yields more than
/// that: surplus bytes already sitting in the read buffer belong to the
/// next pipelined message and are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.remaining, src.len() as u64);
        let bytes = src.split_to(len as usize).freeze();

        self.remaining -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining > 0 && src.is_empty() {
            return Err(ParseError::truncated("fixed-length body"));
        }
        self.decode(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_exactly_the_declared_length() {
        let mut buffer: BytesMut = BytesMut::from(&b"helloGET /next HTTP/1.1\r\n\r\n"[..]);
        let mut decoder = LengthDecoder::new(5);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&item.into_bytes().unwrap()[..], b"hello");

        // the surplus stays buffered for the next message
        assert_eq!(&buffer[..], b"GET /next HTTP/1.1\r\n\r\n");

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(item.is_eof());
        assert_eq!(&buffer[..], b"GET /next HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn reassembles_partial_arrivals() {
        let mut buffer = BytesMut::from(&b"he"[..]);
        let mut decoder = LengthDecoder::new(5);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&item.into_bytes().unwrap()[..], b"he");

        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"llo");
        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&item.into_bytes().unwrap()[..], b"llo");

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn eof_before_declared_length_is_truncation() {
        let mut buffer = BytesMut::new();
        let mut decoder = LengthDecoder::new(5);

        assert!(matches!(decoder.decode_eof(&mut buffer), Err(ParseError::Truncated { .. })));
    }
}
