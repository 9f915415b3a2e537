//! Unified body encoder dispatching on the response's [`BodyFraming`].

use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{BodyFraming, PayloadItem, SendError};
use bytes::BytesMut;
use tokio_util::codec::Encoder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthEncoder),
    Chunked(ChunkedEncoder),
    /// Close-delimited: bytes pass through verbatim, the connection close
    /// terminates the body.
    Raw { eof: bool },
    NoBody,
}

impl PayloadEncoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    pub fn fixed(length: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(length)) }
    }

    pub fn raw() -> Self {
        Self { kind: Kind::Raw { eof: false } }
    }

    pub fn is_finished(&self) -> bool {
        match &self.kind {
            Kind::Length(encoder) => encoder.is_finished(),
            Kind::Chunked(encoder) => encoder.is_finished(),
            Kind::Raw { eof } => *eof,
            Kind::NoBody => true,
        }
    }
}

impl From<BodyFraming> for PayloadEncoder {
    fn from(framing: BodyFraming) -> Self {
        match framing {
            BodyFraming::None => Self::empty(),
            BodyFraming::Fixed(length) => Self::fixed(length),
            BodyFraming::Chunked => Self::chunked(),
            BodyFraming::UntilClose => Self::raw(),
        }
    }
}

impl Encoder<PayloadItem> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(item, dst),
            Kind::Chunked(encoder) => encoder.encode(item, dst),
            Kind::Raw { eof } => {
                match item {
                    PayloadItem::Chunk(bytes) => dst.extend_from_slice(&bytes),
                    PayloadItem::Eof => *eof = true,
                }
                Ok(())
            }
            Kind::NoBody => Ok(()),
        }
    }
}
