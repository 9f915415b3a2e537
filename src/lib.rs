//! A non-blocking HTTP/1.1 wire-protocol engine
//!
//! This crate implements the server side of HTTP/1.1 on top of tokio:
//! request parsing, body framing, pipelined connection handling with
//! strictly ordered responses, and a limited accept loop with graceful
//! shutdown. A response decoder for the client direction is included so
//! the same codecs can drive both ends of a connection.
//!
//! # Features
//!
//! - Full HTTP/1.1 request parsing with zero-copy headers
//! - Fixed-length, chunked and close-delimited body framing
//! - Request pipelining with responses written in request order
//! - Keep-alive and HTTP/1.0 compatibility rules
//! - Expect-continue interim responses
//! - Courtesy `400`/`431` replies for malformed or oversized requests
//! - Configurable limits, idle and read timeouts
//! - Connection-limited accept loop with graceful shutdown
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! use http::{Request, Response, StatusCode};
//! use http_body_util::BodyExt;
//! use tracing::{info, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! use h1_engine::config::ServerConfig;
//! use h1_engine::handler::make_handler;
//! use h1_engine::protocol::body::ReqBody;
//! use h1_engine::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber)?;
//!
//!     let server = Server::bind("127.0.0.1:8080", ServerConfig::default()).await?;
//!     info!(addr = ?server.local_addr()?, "start listening");
//!
//!     server.run(Arc::new(make_handler(hello_world))).await?;
//!     Ok(())
//! }
//!
//! async fn hello_world(request: Request<ReqBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
//!     let path = request.uri().path().to_string();
//!     info!("request path {}", path);
//!
//!     let body_bytes = request.into_body().collect().await?.to_bytes();
//!     info!(body_len = body_bytes.len(), "received request body");
//!
//!     let response = Response::builder().status(StatusCode::OK).body("Hello World!\r\n".to_string())?;
//!     Ok(response)
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`server`]: Accept loop, connection limiting and graceful shutdown
//! - [`connection`]: Per-connection read/write loops and response ordering
//! - [`codec`]: Streaming encoders and decoders for heads and bodies
//! - [`protocol`]: Message types, framing rules and error taxonomy
//! - [`handler`]: Request handler traits and utilities
//! - [`config`]: Limits and timeouts
//!
//! # Pipelining
//!
//! A client may send several requests before reading any response. The
//! engine parses them back-to-back, runs each handler in its own task, and
//! writes the responses in request order regardless of which handler
//! finishes first. A response slot is reserved in a bounded queue the
//! moment a request head is parsed; the queue's capacity bounds how many
//! requests may be in flight on one connection.
//!
//! # Error Handling
//!
//! Protocol failures are answered on the wire before the connection is
//! closed: syntax errors with `400 Bad Request`, breached header limits
//! with `431 Request Header Fields Too Large`. Handler failures become
//! `500 Internal Server Error` and leave the connection usable. The error
//! types are:
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::ParseError`]: Request parsing errors
//! - [`protocol::SendError`]: Response sending errors
//!
//! # Limitations
//!
//! - HTTP/1.1 and HTTP/1.0 only (no HTTP/2 or HTTP/3)
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Request trailers after chunked bodies are discarded
//!
//! # Safety
//!
//! Header parsing records byte offsets computed from pointer arithmetic
//! against the read buffer while the `httparse` borrow is live. No other
//! unsafe-adjacent tricks are used and the crate itself contains no
//! `unsafe` blocks.

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
