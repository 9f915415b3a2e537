//! Head codecs: request head parsing and response head serialization.

mod decoder;
mod encoder;

pub use decoder::HeaderDecoder;
pub use encoder::HeaderEncoder;

pub(crate) use decoder::{extend_header_map, record_header_indices};
