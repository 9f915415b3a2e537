//! Streaming request body.
//!
//! The connection loop is the producer: it pumps decoded payload frames
//! from the framed transport into a bounded channel, which both delivers
//! chunks to the handler and enforces backpressure against the socket.
//! [`ReqBody`] is the consumer half, implementing `http_body::Body`.

mod req_body;
pub use req_body::ReqBody;
