//! Body framing codecs.
//!
//! Decoders cover the three delimiting modes a body can arrive in
//! (fixed-length, chunked, close-delimited); encoders cover the two modes
//! responses are written in (fixed-length, chunked) plus verbatim
//! pass-through for close-delimited output. [`PayloadDecoder`] and
//! [`PayloadEncoder`] dispatch on [`crate::protocol::BodyFraming`].

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;
mod until_close_decoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
