//! Accept/dispatch loop.
//!
//! [`Server`] binds a listener and spawns one [`HttpConnection`] task per
//! accepted stream. A semaphore permit is taken before `accept` so the
//! configured connection limit also throttles the accept loop itself:
//! when the limit is reached, new connections stay in the kernel backlog
//! until a permit frees up.
//!
//! Shutdown is cooperative. Cancelling the token returned by
//! [`Server::shutdown_handle`] stops accepting, then waits up to the
//! configured grace period for open connections to drain before
//! cancelling them.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body::Body;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::select;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::HttpConnection;
use crate::handler::Handler;
use crate::protocol::BoxError;

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    shutdown: CancellationToken,
}

impl Server {
    /// Binds a TCP listener and prepares the accept loop.
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener, config))
    }

    /// Wraps an already bound listener.
    pub fn from_listener(listener: TcpListener, config: ServerConfig) -> Self {
        Self { listener, config, shutdown: CancellationToken::new() }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that stops the accept loop and starts a graceful shutdown
    /// when cancelled.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accepts and serves connections until the shutdown token fires.
    pub async fn run<H>(self, handler: Arc<H>) -> io::Result<()>
    where
        H: Handler + Send + Sync + 'static,
        H::RespBody: Body<Data = Bytes> + Send + 'static,
        <H::RespBody as Body>::Error: Into<BoxError>,
    {
        let Self { listener, config, shutdown } = self;

        let limiter = Arc::new(Semaphore::new(config.max_connections));
        // child token so draining can cancel connections without
        // re-triggering the accept loop's own select arms
        let connection_token = shutdown.child_token();

        info!(addr = ?listener.local_addr().ok(), max_connections = config.max_connections, "listening");

        loop {
            // take the permit first so a saturated server stops accepting
            let permit = select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = limiter.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer) = select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            debug!(%peer, "accepted connection");
            if let Err(e) = stream.set_nodelay(true) {
                warn!(%peer, error = %e, "failed to set TCP_NODELAY");
            }

            let handler = handler.clone();
            let connection_config = config.connection.clone();
            let token = connection_token.clone();
            tokio::spawn(async move {
                let (read_half, write_half) = stream.into_split();
                let connection = HttpConnection::new(read_half, write_half, &connection_config);
                if let Err(e) = connection.process(handler, token).await {
                    warn!(%peer, error = %e, "connection closed with error");
                }
                drop(permit);
            });
        }

        drain_connections(&limiter, &config, &connection_token).await;
        Ok(())
    }
}

/// Waits for in-flight connections to finish, cancelling whatever is left
/// when the grace period runs out.
async fn drain_connections(limiter: &Arc<Semaphore>, config: &ServerConfig, connection_token: &CancellationToken) {
    let open = config.max_connections - limiter.available_permits();
    if open == 0 {
        info!("shutdown complete, no open connections");
        return;
    }

    info!(open, "waiting for open connections to finish");
    let all_permits = config.max_connections as u32;
    match timeout(config.shutdown_grace, limiter.acquire_many(all_permits)).await {
        Ok(Ok(_)) => info!("all connections drained"),
        Ok(Err(_)) => {}
        Err(_) => {
            let remaining = config.max_connections - limiter.available_permits();
            warn!(remaining, "grace period expired, cancelling remaining connections");
            connection_token.cancel();
            // give cancelled connections a moment to flush their queues
            let _ = timeout(config.shutdown_grace, limiter.acquire_many(all_permits)).await;
        }
    }
}
