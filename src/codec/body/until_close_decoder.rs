//! Decoder for close-delimited bodies: everything up to transport EOF is
//! body. Used for responses that carry neither Content-Length nor a chunked
//! Transfer-Encoding.

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntilCloseDecoder {
    finished: bool,
}

impl UntilCloseDecoder {
    pub fn new() -> Self {
        Self { finished: false }
    }
}

impl Decoder for UntilCloseDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.finished {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let bytes = src.split_to(src.len()).freeze();
        Ok(Some(PayloadItem::Chunk(bytes)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !src.is_empty() {
            return self.decode(src);
        }
        if self.finished {
            return Ok(None);
        }
        self.finished = true;
        Ok(Some(PayloadItem::Eof))
    }
}
