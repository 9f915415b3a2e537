//! Streaming response decoder for the client side of a connection.
//!
//! Mirrors [`RequestDecoder`](crate::codec::RequestDecoder) with one extra
//! input: response framing depends on the request that elicited it (a HEAD
//! reply never has a body), so callers register each outbound request's
//! method with [`ResponseDecoder::expect_reply`] before reading. Replies
//! are matched to registered methods in FIFO order, which is exactly the
//! order a compliant server answers pipelined requests in.

use std::collections::VecDeque;

use bytes::BytesMut;
use http::{HeaderMap, Method, Response, StatusCode, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::{extend_header_map, record_header_indices};
use crate::config::ConnectionConfig;
use crate::ensure;
use crate::protocol::{BodyFraming, Message, ParseError, PayloadItem, ResponseHead};

#[derive(Debug)]
pub struct ResponseDecoder {
    max_header_bytes: usize,
    max_header_count: usize,
    /// Methods of requests sent but not yet answered, oldest first.
    pending_methods: VecDeque<Method>,
    payload_decoder: Option<PayloadDecoder>,
}

impl ResponseDecoder {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            max_header_bytes: config.max_header_bytes,
            max_header_count: config.max_header_count,
            pending_methods: VecDeque::new(),
            payload_decoder: None,
        }
    }

    /// Registers the method of a request that has been written, so the
    /// matching reply's framing can be selected.
    pub fn expect_reply(&mut self, method: Method) {
        self.pending_methods.push_back(method);
    }

    fn decode_head(&mut self, src: &mut BytesMut) -> Result<Option<(ResponseHead, BodyFraming)>, ParseError> {
        let mut indices = Vec::new();
        let (head_end, status, version, header_count) = {
            // httparse only offers the uninit-storage parse entry point on
            // the request side, so the response side pays for zeroed
            // headers up front
            let mut storage = vec![httparse::EMPTY_HEADER; self.max_header_count];
            let mut parsed = httparse::Response::new(&mut storage);

            let parse_status = parsed.parse(src).map_err(|e| match e {
                httparse::Error::TooManyHeaders => ParseError::too_many_headers(self.max_header_count),
                other => ParseError::invalid_header(other.to_string()),
            })?;

            let head_end = match parse_status {
                Status::Complete(head_end) => head_end,
                Status::Partial => {
                    ensure!(src.len() <= self.max_header_bytes, ParseError::too_large_header(src.len(), self.max_header_bytes));
                    return Ok(None);
                }
            };

            trace!(head_bytes = head_end, "parsed response head");
            ensure!(head_end <= self.max_header_bytes, ParseError::too_large_header(head_end, self.max_header_bytes));

            let version = match parsed.version {
                Some(0) => Version::HTTP_10,
                Some(1) => Version::HTTP_11,
                other => return Err(ParseError::InvalidVersion(other)),
            };
            let status = StatusCode::from_u16(parsed.code.ok_or(ParseError::InvalidStatus)?)
                .map_err(|_| ParseError::InvalidStatus)?;

            record_header_indices(src, parsed.headers, &mut indices);

            (head_end, status, version, parsed.headers.len())
        };

        let request_method = self
            .pending_methods
            .pop_front()
            .ok_or_else(|| ParseError::invalid_body("response received with no request outstanding"))?;

        let mut headers = HeaderMap::with_capacity(header_count);
        let header_bytes = src.split_to(head_end).freeze();
        extend_header_map(&header_bytes, &indices, &mut headers)?;

        let framing = BodyFraming::for_response(&request_method, status, version, &headers)?;

        let mut head = Response::new(());
        *head.status_mut() = status;
        *head.version_mut() = version;
        *head.headers_mut() = headers;

        Ok(Some((head, framing)))
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHead, BodyFraming)>;
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

        let message = match self.decode_head(src)? {
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

        match self.decode_head(src)? {
            Some((head, framing)) => {
                self.payload_decoder = Some(framing.into());
                Ok(Some(Message::Header((head, framing))))
            }
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::truncated("response head")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use indoc::indoc;

    fn decoder() -> ResponseDecoder {
        ResponseDecoder::new(&ConnectionConfig::default())
    }

    fn expect_head(message: Option<Message<(ResponseHead, BodyFraming)>>) -> (ResponseHead, BodyFraming) {
        match message {
            Some(Message::Header(header)) => header,
            _ => panic!("expected a response head"),
        }
    }

    fn expect_chunk(message: Option<Message<(ResponseHead, BodyFraming)>>) -> Bytes {
        match message {
            Some(Message::Payload(PayloadItem::Chunk(bytes))) => bytes,
            _ => panic!("expected body chunk"),
        }
    }

    #[test]
    fn decodes_fixed_length_response() {
        let str = indoc! {r##"
        HTTP/1.1 200 OK
        Content-Length: 5

        hello"##};

        let mut decoder = decoder();
        decoder.expect_reply(Method::GET);
        let mut buf = BytesMut::from(str);

        let (head, framing) = expect_head(decoder.decode(&mut buf).unwrap());
        assert_eq!(head.status(), StatusCode::OK);
        assert_eq!(framing, BodyFraming::Fixed(5));
        assert_eq!(expect_chunk(decoder.decode(&mut buf).unwrap()), "hello");
        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
    }

    #[test]
    fn head_reply_has_no_body_despite_content_length() {
        let str = indoc! {r##"
        HTTP/1.1 200 OK
        Content-Length: 1234

        "##};

        let mut decoder = decoder();
        decoder.expect_reply(Method::HEAD);
        let mut buf = BytesMut::from(str);

        let (_, framing) = expect_head(decoder.decode(&mut buf).unwrap());
        assert!(framing.is_empty());
        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
    }

    #[test]
    fn close_delimited_body_ends_at_eof() {
        let str = indoc! {r##"
        HTTP/1.1 200 OK
        Connection: close

        partial strea"##};

        let mut decoder = decoder();
        decoder.expect_reply(Method::GET);
        let mut buf = BytesMut::from(str);

        let (_, framing) = expect_head(decoder.decode(&mut buf).unwrap());
        assert_eq!(framing, BodyFraming::UntilClose);
        assert_eq!(expect_chunk(decoder.decode(&mut buf).unwrap()), "partial strea");

        assert!(matches!(decoder.decode_eof(&mut buf).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
    }

    #[test]
    fn too_many_response_headers_is_a_resource_limit_failure() {
        let mut decoder = ResponseDecoder::new(&ConnectionConfig::default().with_max_header_count(2));
        decoder.expect_reply(Method::GET);

        let str = indoc! {r##"
        HTTP/1.1 200 OK
        A: 1
        B: 2
        C: 3

        "##};

        let mut buf = BytesMut::from(str);
        match decoder.decode(&mut buf) {
            Err(e) => assert!(e.is_resource_limit()),
            Ok(_) => panic!("expected TooManyHeaders"),
        }
    }

    #[test]
    fn unsolicited_response_is_rejected() {
        let mut decoder = decoder();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"[..]);
        assert!(decoder.decode(&mut buf).is_err());
    }
}
