//! Request head decoder.
//!
//! Parses the request line and header block with `httparse` over the
//! accumulated read buffer, then converts the result into a typed
//! [`RequestHead`] without copying header bytes: name/value byte ranges are
//! recorded while the parse borrow is live, the head is split off the
//! buffer as frozen `Bytes`, and header values are shared slices of it.
//!
//! Limits come from [`ConnectionConfig`]: a header block whose accumulated
//! bytes exceed `max_header_bytes` — even while still incomplete — or whose
//! field count exceeds `max_header_count` fails with a resource-limit error
//! rather than a syntax error.

use std::mem::MaybeUninit;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::config::ConnectionConfig;
use crate::ensure;
use crate::protocol::{BodyFraming, ParseError, RequestHead};

/// Shortest parseable request head ("GET / HTTP/1.1" plus line endings);
/// anything shorter cannot be complete, so don't bother parsing yet.
const MIN_HEAD_BYTES: usize = 14;

/// Decoder for request heads, yielding the typed head together with its
/// body framing.
#[derive(Debug)]
pub struct HeaderDecoder {
    max_header_bytes: usize,
    max_header_count: usize,
}

impl HeaderDecoder {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self { max_header_bytes: config.max_header_bytes, max_header_count: config.max_header_count }
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHead, BodyFraming);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MIN_HEAD_BYTES {
            ensure!(src.len() <= self.max_header_bytes, ParseError::too_large_header(src.len(), self.max_header_bytes));
            return Ok(None);
        }

        let mut indices = Vec::new();
        let (head_end, method, uri, version, header_count) = {
            let mut storage = header_storage(self.max_header_count);
            let mut parsed = httparse::Request::new(&mut []);

            let status = parsed.parse_with_uninit_headers(src, &mut storage).map_err(|e| match e {
                httparse::Error::TooManyHeaders => ParseError::too_many_headers(self.max_header_count),
                other => ParseError::invalid_header(other.to_string()),
            })?;

            let head_end = match status {
                Status::Complete(head_end) => head_end,
                Status::Partial => {
                    // keep a half-received header block bounded
                    ensure!(src.len() <= self.max_header_bytes, ParseError::too_large_header(src.len(), self.max_header_bytes));
                    return Ok(None);
                }
            };

            trace!(head_bytes = head_end, "parsed request head");
            ensure!(head_end <= self.max_header_bytes, ParseError::too_large_header(head_end, self.max_header_bytes));

            let version = match parsed.version {
                Some(0) => Version::HTTP_10,
                Some(1) => Version::HTTP_11,
                other => return Err(ParseError::InvalidVersion(other)),
            };

            let method =
                Method::from_bytes(parsed.method.ok_or(ParseError::InvalidMethod)?.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
            let uri: Uri = parsed.path.ok_or(ParseError::InvalidUri)?.parse().map_err(|_| ParseError::InvalidUri)?;

            record_header_indices(src, parsed.headers, &mut indices);

            (head_end, method, uri, version, parsed.headers.len())
        };

        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .version(version)
            .body(())
            .map_err(|e| ParseError::invalid_header(e.to_string()))?;

        request.headers_mut().reserve(header_count);

        let header_bytes = src.split_to(head_end).freeze();
        extend_header_map(&header_bytes, &indices, request.headers_mut())?;

        let head = RequestHead::from(request);
        let framing = BodyFraming::for_request(&head)?;

        Ok(Some((head, framing)))
    }
}

fn header_storage<'b>(count: usize) -> Vec<MaybeUninit<httparse::Header<'b>>> {
    let mut storage = Vec::with_capacity(count);
    storage.resize_with(count, MaybeUninit::uninit);
    storage
}

/// Byte ranges of one header's name and value within the head buffer.
#[derive(Clone, Copy)]
pub(crate) struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

/// Records name/value byte ranges relative to `bytes`, so the header map
/// can be built from shared slices after the parse borrow ends.
pub(crate) fn record_header_indices(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut Vec<HeaderIndex>) {
    let base = bytes.as_ptr() as usize;
    indices.reserve(headers.len());
    for header in headers {
        let name_start = header.name.as_ptr() as usize - base;
        let value_start = header.value.as_ptr() as usize - base;
        indices.push(HeaderIndex {
            name: (name_start, name_start + header.name.len()),
            value: (value_start, value_start + header.value.len()),
        });
    }
}

/// Appends each recorded header to `map`, keeping repeated names as
/// separate entries in arrival order. Values are zero-copy slices of the
/// frozen head buffer.
pub(crate) fn extend_header_map(header_bytes: &Bytes, indices: &[HeaderIndex], map: &mut HeaderMap) -> Result<(), ParseError> {
    for index in indices {
        let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1])
            .map_err(|e| ParseError::invalid_header(e.to_string()))?;
        let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
            .map_err(|e| ParseError::invalid_header(e.to_string()))?;
        map.append(name, value);
    }
    Ok(())
}
