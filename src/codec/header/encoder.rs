//! Response head encoder.
//!
//! Serializes the status line and header block, forcing the framing
//! headers (`Content-Length`, `Transfer-Encoding`, `Connection: close`) to
//! match the [`BodyFraming`] the response will actually be written with.

use crate::protocol::{BodyFraming, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};
use http::{header, HeaderValue, Version};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer reservation for head serialization.
const INIT_HEAD_SIZE: usize = 4 * 1024;

/// Encoder for a response head paired with its body framing.
#[derive(Debug)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, BodyFraming)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, BodyFraming), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, framing) = item;

        dst.reserve(INIT_HEAD_SIZE);
        let version = match head.version() {
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };
        write!(
            FastWrite(dst),
            "{} {} {}\r\n",
            version,
            head.status().as_str(),
            head.status().canonical_reason().unwrap_or("Unknown")
        )?;

        // Framing headers are owned by the encoder; whatever the handler set
        // is overwritten so the head can never contradict the body bytes.
        match framing {
            BodyFraming::Fixed(n) => {
                head.headers_mut().remove(header::TRANSFER_ENCODING);
                head.headers_mut().insert(header::CONTENT_LENGTH, n.into());
            }
            BodyFraming::Chunked => {
                head.headers_mut().remove(header::CONTENT_LENGTH);
                head.headers_mut().insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            BodyFraming::UntilClose => {
                head.headers_mut().remove(header::CONTENT_LENGTH);
                head.headers_mut().remove(header::TRANSFER_ENCODING);
                head.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
            }
            BodyFraming::None => {
                head.headers_mut().remove(header::TRANSFER_ENCODING);
                if !status_forbids_body(&head) {
                    head.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
                }
            }
        }

        for (header_name, header_value) in head.headers().iter() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// 1xx and 204 responses must not carry `Content-Length` at all; 304
/// keeps whatever the handler set for the would-be representation.
fn status_forbids_body(head: &ResponseHead) -> bool {
    head.status().is_informational() || head.status() == http::StatusCode::NO_CONTENT
}

/// Writes into a `BytesMut` that already has space reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
