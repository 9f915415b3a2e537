//! Streaming response encoder.
//!
//! Mirrors the request decoder's state machine in the write direction: a
//! head frame selects the payload encoder from its framing, then payload
//! frames are written through it until [`PayloadItem::Eof`] returns the
//! machine to the head phase for the next pipelined response.

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{BodyFraming, Message, ResponseHead, SendError};
use bytes::BytesMut;
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

#[derive(Debug)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None }
    }
}

impl Encoder<Message<(ResponseHead, BodyFraming)>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, BodyFraming)>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, framing)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.payload_encoder = Some(framing.into());
                self.header_encoder.encode((head, framing), dst)
            }

            Message::Payload(payload_item) => {
                let payload_encoder = if let Some(encoder) = &mut self.payload_encoder {
                    encoder
                } else {
                    error!("expect response head but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                // the Eof frame ends the body phase, not byte exhaustion:
                // a fixed-length body runs out of bytes one frame before
                // its Eof arrives
                let is_eof = payload_item.is_eof();
                payload_encoder.encode(payload_item, dst)?;

                if is_eof {
                    self.payload_encoder.take();
                }

                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PayloadItem;
    use bytes::Bytes;
    use http::{Response, StatusCode};

    fn head(status: StatusCode) -> ResponseHead {
        Response::builder().status(status).body(()).unwrap()
    }

    #[test]
    fn encodes_fixed_length_response() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::Header((head(StatusCode::OK), BodyFraming::Fixed(5))), &mut dst).unwrap();
        encoder.encode(Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))), &mut dst).unwrap();
        encoder.encode(Message::Payload(PayloadItem::Eof), &mut dst).unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nhello");
    }

    #[test]
    fn eof_after_a_full_fixed_body_returns_to_the_head_phase() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::Header((head(StatusCode::OK), BodyFraming::Fixed(2))), &mut dst).unwrap();
        encoder.encode(Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hi"))), &mut dst).unwrap();
        // the trailing end-of-body marker must not be mistaken for a
        // stray payload frame
        encoder.encode(Message::Payload(PayloadItem::Eof), &mut dst).unwrap();

        encoder.encode(Message::Header((head(StatusCode::OK), BodyFraming::None)), &mut dst).unwrap();
        assert_eq!(std::str::from_utf8(&dst).unwrap().matches("HTTP/1.1 200 OK").count(), 2);
    }

    #[test]
    fn encodes_two_pipelined_responses() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::Header((head(StatusCode::OK), BodyFraming::Fixed(1))), &mut dst).unwrap();
        encoder.encode(Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"a"))), &mut dst).unwrap();
        encoder.encode(Message::Payload(PayloadItem::Eof), &mut dst).unwrap();
        encoder.encode(Message::Header((head(StatusCode::NOT_FOUND), BodyFraming::None)), &mut dst).unwrap();
        encoder.encode(Message::Payload(PayloadItem::Eof), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn payload_before_head_is_rejected() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let result = encoder.encode(Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"x"))), &mut dst);
        assert!(result.is_err());
    }

    #[test]
    fn head_during_unfinished_body_is_rejected() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::Header((head(StatusCode::OK), BodyFraming::Fixed(5))), &mut dst).unwrap();
        let result = encoder.encode(Message::Header((head(StatusCode::OK), BodyFraming::None)), &mut dst);
        assert!(result.is_err());
    }
}
