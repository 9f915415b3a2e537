//! Body framing selection.
//!
//! Exactly one framing mode is chosen per message from its headers and
//! message semantics, following the RFC 7230 precedence rules: bodiless
//! semantics first, then `Transfer-Encoding: chunked`, then
//! `Content-Length`, then (responses only) close-delimited, otherwise no
//! body.

use http::header::{CONTENT_LENGTH, CONNECTION, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};

use crate::protocol::{ParseError, RequestHead};

/// How a message body is delimited on the wire.
///
/// Once a framing signals end-of-body, the connection's read cursor sits
/// exactly at the first byte of the next message. That invariant is what
/// makes request pipelining possible.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body at all.
    None,
    /// Exactly this many body bytes follow the head.
    Fixed(u64),
    /// The body is a sequence of size-prefixed chunks.
    Chunked,
    /// The body runs until the peer closes the connection. Response
    /// direction only; a close-delimited message can never be followed by
    /// another one.
    UntilClose,
}

impl BodyFraming {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, BodyFraming::None)
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, BodyFraming::Chunked)
    }

    #[inline]
    pub fn is_until_close(&self) -> bool {
        matches!(self, BodyFraming::UntilClose)
    }

    /// Selects the framing for an incoming request.
    ///
    /// Requests are never close-delimited: without `Content-Length` or a
    /// chunked `Transfer-Encoding` there is no body. `Content-Length` is
    /// honored for every method so that stray body bytes can never corrupt
    /// the next pipelined message.
    pub fn for_request(head: &RequestHead) -> Result<Self, ParseError> {
        let headers = head.headers();

        // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
        let te_header = headers.get(TRANSFER_ENCODING);
        let length = content_length(headers)?;

        match (te_header, length) {
            (None, None) => Ok(BodyFraming::None),

            (te_value @ Some(_), None) => {
                if ends_with_chunked(te_value) {
                    Ok(BodyFraming::Chunked)
                } else {
                    Ok(BodyFraming::None)
                }
            }

            (None, Some(0)) => Ok(BodyFraming::None),
            (None, Some(n)) => Ok(BodyFraming::Fixed(n)),

            (Some(_), Some(_)) => {
                Err(ParseError::invalid_content_length("transfer-encoding and content-length both present"))
            }
        }
    }

    /// Selects the framing for an incoming response.
    ///
    /// `request_method` is the method of the request this response answers;
    /// a response to HEAD never carries a body regardless of its headers,
    /// and neither do 1xx/204/304 responses.
    pub fn for_response(
        request_method: &Method,
        status: StatusCode,
        version: Version,
        headers: &HeaderMap,
    ) -> Result<Self, ParseError> {
        if request_method == Method::HEAD
            || (request_method == Method::CONNECT && status.is_success())
            || status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            return Ok(BodyFraming::None);
        }

        if ends_with_chunked(headers.get(TRANSFER_ENCODING)) {
            return Ok(BodyFraming::Chunked);
        }

        if let Some(length) = content_length(headers)? {
            return Ok(if length == 0 { BodyFraming::None } else { BodyFraming::Fixed(length) });
        }

        if close_delimited(version, headers.get(CONNECTION)) {
            return Ok(BodyFraming::UntilClose);
        }

        Ok(BodyFraming::None)
    }
}

/// Reads a validated Content-Length value, rejecting repeated headers.
fn content_length(headers: &HeaderMap) -> Result<Option<u64>, ParseError> {
    let mut values = headers.get_all(CONTENT_LENGTH).iter();

    let Some(value) = values.next() else {
        return Ok(None);
    };

    if values.next().is_some() {
        return Err(ParseError::invalid_content_length("duplicate content-length header"));
    }

    let value_str = value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;
    let length = value_str
        .trim()
        .parse::<u64>()
        .map_err(|_| ParseError::invalid_content_length(format!("value {value_str} is not a valid length")))?;

    Ok(Some(length))
}

/// Checks whether `chunked` is the final transfer coding.
///
/// According to RFC 7230, chunked must be the last encoding if present.
fn ends_with_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value {
        if let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next() {
            return bytes.trim_ascii().eq_ignore_ascii_case(CHUNKED);
        }
    }
    false
}

fn close_delimited(version: Version, connection: Option<&HeaderValue>) -> bool {
    let connection = connection.and_then(|value| value.to_str().ok());
    let has_token = |token: &str| {
        connection.is_some_and(|value| value.split(',').any(|part| part.trim().eq_ignore_ascii_case(token)))
    };

    match version {
        Version::HTTP_11 => has_token("close"),
        Version::HTTP_10 => !has_token("keep-alive"),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn request_head(builder: http::request::Builder) -> RequestHead {
        RequestHead::from(builder.body(()).unwrap())
    }

    #[test]
    fn request_without_length_headers_has_no_body() {
        let head = request_head(Request::builder().method("GET").uri("/"));
        assert_eq!(BodyFraming::for_request(&head).unwrap(), BodyFraming::None);
    }

    #[test]
    fn request_content_length_is_honored_for_any_method() {
        let head = request_head(Request::builder().method("GET").uri("/").header("content-length", "5"));
        assert_eq!(BodyFraming::for_request(&head).unwrap(), BodyFraming::Fixed(5));

        let head = request_head(Request::builder().method("POST").uri("/").header("content-length", "0"));
        assert_eq!(BodyFraming::for_request(&head).unwrap(), BodyFraming::None);
    }

    #[test]
    fn request_chunked_must_be_the_final_coding() {
        let head = request_head(Request::builder().method("POST").uri("/").header("transfer-encoding", "gzip, chunked"));
        assert_eq!(BodyFraming::for_request(&head).unwrap(), BodyFraming::Chunked);

        let head = request_head(Request::builder().method("POST").uri("/").header("transfer-encoding", "chunked, gzip"));
        assert_eq!(BodyFraming::for_request(&head).unwrap(), BodyFraming::None);
    }

    #[test]
    fn request_with_both_length_and_chunked_is_rejected() {
        let head = request_head(
            Request::builder().method("POST").uri("/").header("transfer-encoding", "chunked").header("content-length", "5"),
        );
        assert!(BodyFraming::for_request(&head).is_err());
    }

    #[test]
    fn duplicate_content_length_is_rejected() {
        let head = request_head(
            Request::builder().method("POST").uri("/").header("content-length", "5").header("content-length", "5"),
        );
        assert!(BodyFraming::for_request(&head).is_err());
    }

    #[test]
    fn response_head_and_no_content_never_have_bodies() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "10".parse().unwrap());

        let framing = BodyFraming::for_response(&Method::HEAD, StatusCode::OK, Version::HTTP_11, &headers).unwrap();
        assert_eq!(framing, BodyFraming::None);

        let framing =
            BodyFraming::for_response(&Method::GET, StatusCode::NO_CONTENT, Version::HTTP_11, &HeaderMap::new()).unwrap();
        assert_eq!(framing, BodyFraming::None);

        let framing =
            BodyFraming::for_response(&Method::GET, StatusCode::NOT_MODIFIED, Version::HTTP_11, &HeaderMap::new()).unwrap();
        assert_eq!(framing, BodyFraming::None);
    }

    #[test]
    fn response_framing_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(TRANSFER_ENCODING, "chunked".parse().unwrap());
        let framing = BodyFraming::for_response(&Method::GET, StatusCode::OK, Version::HTTP_11, &headers).unwrap();
        assert_eq!(framing, BodyFraming::Chunked);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "42".parse().unwrap());
        let framing = BodyFraming::for_response(&Method::GET, StatusCode::OK, Version::HTTP_11, &headers).unwrap();
        assert_eq!(framing, BodyFraming::Fixed(42));
    }

    #[test]
    fn response_without_framing_headers_is_close_delimited() {
        let framing = BodyFraming::for_response(&Method::GET, StatusCode::OK, Version::HTTP_10, &HeaderMap::new()).unwrap();
        assert_eq!(framing, BodyFraming::UntilClose);

        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, "close".parse().unwrap());
        let framing = BodyFraming::for_response(&Method::GET, StatusCode::OK, Version::HTTP_11, &headers).unwrap();
        assert_eq!(framing, BodyFraming::UntilClose);

        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, "keep-alive".parse().unwrap());
        let framing = BodyFraming::for_response(&Method::GET, StatusCode::OK, Version::HTTP_11, &headers).unwrap();
        assert_eq!(framing, BodyFraming::None);
    }
}
