//! Parsed request head.
//!
//! [`RequestHead`] wraps `http::Request<()>` and answers the connection
//! questions the engine needs per message: can the connection be reused
//! afterwards, and does the client expect an interim `100 Continue`.

use http::header::{CONNECTION, EXPECT};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

/// The parsed start line and headers of one request. Immutable once built;
/// the associated body stream is attached separately and may outlive it.
#[derive(Debug)]
pub struct RequestHead {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHead {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHead {
    /// Consumes the head and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, turning the head into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the connection may serve another request after this one.
    ///
    /// HTTP/1.1 connections persist unless the client sent
    /// `Connection: close`; HTTP/1.0 connections close unless the client
    /// opted in with `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        match self.version() {
            Version::HTTP_11 => !self.has_connection_token("close"),
            Version::HTTP_10 => self.has_connection_token("keep-alive"),
            _ => false,
        }
    }

    /// Whether the client asked for an interim `100 Continue` before
    /// sending the request body.
    pub fn expects_continue(&self) -> bool {
        self.headers()
            .get(EXPECT)
            .is_some_and(|value| value.as_bytes().len() >= 4 && value.as_bytes()[..4].eq_ignore_ascii_case(b"100-"))
    }

    fn has_connection_token(&self, token: &str) -> bool {
        self.headers()
            .get(CONNECTION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.split(',').any(|part| part.trim().eq_ignore_ascii_case(token)))
    }
}

impl From<Parts> for RequestHead {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHead {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(builder: http::request::Builder) -> RequestHead {
        RequestHead::from(builder.body(()).unwrap())
    }

    #[test]
    fn http_11_persists_by_default() {
        assert!(head(Request::builder().uri("/")).keep_alive());
    }

    #[test]
    fn http_11_close_wins() {
        assert!(!head(Request::builder().uri("/").header("connection", "Close")).keep_alive());
        assert!(!head(Request::builder().uri("/").header("connection", "upgrade, close")).keep_alive());
    }

    #[test]
    fn http_10_closes_unless_keep_alive() {
        assert!(!head(Request::builder().uri("/").version(Version::HTTP_10)).keep_alive());
        assert!(head(Request::builder().uri("/").version(Version::HTTP_10).header("connection", "keep-alive")).keep_alive());
    }

    #[test]
    fn expect_continue_detection() {
        assert!(head(Request::builder().uri("/").header("expect", "100-continue")).expects_continue());
        assert!(!head(Request::builder().uri("/")).expects_continue());
    }
}
