//! Streaming codecs for HTTP/1.1 message exchange.
//!
//! Decoding and encoding both follow the same shape: a head codec handles
//! the start line and header block, a body codec handles the framed
//! payload, and a message-level state machine ties the two together so
//! that pipelined messages flow back-to-back through one buffer.
//!
//! - [`RequestDecoder`] / [`ResponseEncoder`]: the server side
//! - [`ResponseDecoder`]: the client side

pub mod body;
pub mod header;
mod request_decoder;
mod response_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_decoder::ResponseDecoder;
pub use response_encoder::ResponseEncoder;
