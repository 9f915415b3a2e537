//! Engine configuration.
//!
//! All limits and timeouts consumed by the engine are carried by plain
//! configuration values passed in at construction time. There is no global
//! mutable state: every connection loop receives its own
//! [`ConnectionConfig`] clone, and every listener its own [`ServerConfig`].

use std::time::Duration;

/// Per-connection protocol limits and timeouts.
///
/// The defaults match common HTTP/1.1 server practice: an 8 KiB header
/// block, at most 64 header fields and a 30 second idle window.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum size in bytes of a request head (start line plus headers).
    pub max_header_bytes: usize,
    /// Maximum number of header fields in a single request.
    pub max_header_count: usize,
    /// How long an idle connection may wait for the next request head.
    pub idle_timeout: Duration,
    /// How long a single body read may stall before the connection is closed.
    pub read_timeout: Duration,
    /// How many responses may be outstanding on one connection before the
    /// reader stops accepting further pipelined requests.
    pub pipeline_depth: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 8 * 1024,
            max_header_count: 64,
            idle_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            pipeline_depth: 8,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.max_header_bytes = max_header_bytes;
        self
    }

    pub fn with_max_header_count(mut self, max_header_count: usize) -> Self {
        self.max_header_count = max_header_count;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_pipeline_depth(mut self, pipeline_depth: usize) -> Self {
        self.pipeline_depth = pipeline_depth;
        self
    }
}

/// Listener-wide configuration for the accept/dispatch loop.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound on concurrently served connections. Accepting suspends
    /// once the limit is reached.
    pub max_connections: usize,
    /// How long a graceful shutdown waits for in-flight connections before
    /// aborting them.
    pub shutdown_grace: Duration,
    /// Configuration handed to every accepted connection.
    pub connection: ConnectionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { max_connections: 1024, shutdown_grace: Duration::from_secs(30), connection: ConnectionConfig::default() }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }
}
