//! Connection-level request/response processing.
//!
//! [`HttpConnection`] owns one accepted stream and runs the split
//! reader/writer pair that serves pipelined requests on it in order.

mod http_connection;
mod writer;

pub use http_connection::HttpConnection;
pub use writer::{empty_body, OutboundBody};
