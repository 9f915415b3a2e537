use std::error::Error;
use std::io;
use thiserror::Error;

/// Boxed error type used at the handler boundary.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("connection timed out while reading {phase}")]
    Timeout { phase: &'static str },
}

/// Errors raised while parsing an incoming message.
///
/// Resource-limit failures (header block too large, too many headers, a
/// chunk line running past its cap) are kept distinct from protocol-syntax
/// failures so the connection loop can answer with 431 instead of 400.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header block too large, current: {current_size} exceeds the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header count exceeds the limit {max_count}")]
    TooManyHeaders { max_count: usize },

    #[error("line exceeds the limit {max_bytes}")]
    LineTooLong { max_bytes: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid http status code")]
    InvalidStatus,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunked framing: {reason}")]
    InvalidChunk { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("unexpected end of stream while reading {what}")]
    Truncated { what: &'static str },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_count: usize) -> Self {
        Self::TooManyHeaders { max_count }
    }

    pub fn line_too_long(max_bytes: usize) -> Self {
        Self::LineTooLong { max_bytes }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(reason: S) -> Self {
        Self::InvalidChunk { reason: reason.to_string() }
    }

    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn truncated(what: &'static str) -> Self {
        Self::Truncated { what }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// True for failures caused by exceeding a configured cap rather than by
    /// malformed input.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Self::TooLargeHeader { .. } | Self::TooManyHeaders { .. } | Self::LineTooLong { .. })
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
