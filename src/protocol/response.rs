//! Response head type.
//!
//! The engine represents a response head as `http::Response<()>`; the body
//! is streamed separately by the ordered writer.

use http::Response;

/// The header portion of an HTTP response, before the body is attached.
pub type ResponseHead = Response<()>;
