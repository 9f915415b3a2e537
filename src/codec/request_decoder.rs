//! Streaming request decoder.
//!
//! Runs a two-phase state machine over the read buffer: first the head via
//! [`HeaderDecoder`], then the body via the [`PayloadDecoder`] the head's
//! framing selects. Emitting [`PayloadItem::Eof`] returns the machine to
//! the head phase, so pipelined requests decode back-to-back from the same
//! buffer without losing the bytes that follow a body.

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::config::ConnectionConfig;
use crate::protocol::{BodyFraming, Message, ParseError, PayloadItem, RequestHead};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Decoder for a full request stream.
///
/// `payload_decoder` doubles as the phase marker: `None` while parsing a
/// head, `Some` while draining its body.
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self { header_decoder: HeaderDecoder::new(config), payload_decoder: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHead, BodyFraming)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((head, framing)) => {
                self.payload_decoder = Some(framing.into());
                Some(Message::Header((head, framing)))
            }
            None => None,
        };

        Ok(message)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode_eof(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        match self.header_decoder.decode(src)? {
            Some((head, framing)) => {
                self.payload_decoder = Some(framing.into());
                Ok(Some(Message::Header((head, framing))))
            }
            // EOF between requests is a clean close; EOF inside a head is not.
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::truncated("request head")),
        }
    }
}
