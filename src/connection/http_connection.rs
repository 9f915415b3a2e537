//! Per-connection protocol loop.
//!
//! One task reads, one task writes. The reader parses request heads and
//! pumps body chunks into a bounded channel for the handler; each request's
//! handler runs in its own task so a slow response does not stall parsing
//! of the requests queued behind it. Response bytes are sequenced by the
//! write queue (see [`super::writer`]), which is what keeps pipelined
//! responses in request order.
//!
//! The reader applies the configured idle timeout while waiting for a new
//! request head and the read timeout while a body is in flight. Parse
//! failures are answered with a courtesy `400 Bad Request`, or `431` when
//! the failure was a configured limit rather than bad syntax, and then the
//! connection is torn down.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use http::{Method, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::config::ConnectionConfig;
use crate::connection::writer::{drain_write_queue, empty_body, error_response, OutboundBody, ResponseSlot, WriteItem};
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::{BoxError, HttpError, Message, ParseError, PayloadItem, RequestHead, SendError};

/// Size of the per-request body channel, in chunks. Filling it suspends
/// the socket read until the handler catches up.
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Read buffer capacity handed to the framed reader.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// A single accepted connection, ready to serve requests.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    config: ConnectionConfig,
}

impl<R, W> std::fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W, config: &ConnectionConfig) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(config), READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            config: config.clone(),
        }
    }

    /// Serves requests until the peer goes away, the idle timeout expires,
    /// `shutdown` fires, or the protocol is violated.
    ///
    /// All responses accepted into the write queue before the loop ends are
    /// still written out.
    pub async fn process<H>(self, handler: Arc<H>, shutdown: CancellationToken) -> Result<(), HttpError>
    where
        H: Handler + Send + Sync + 'static,
        H::RespBody: Body<Data = Bytes> + Send + 'static,
        <H::RespBody as Body>::Error: Into<BoxError>,
    {
        let Self { mut framed_read, framed_write, config } = self;

        let (queue_tx, queue_rx) = mpsc::channel(config.pipeline_depth);
        let writer_task = tokio::spawn(drain_write_queue(queue_rx, framed_write));

        let read_result = read_loop(&mut framed_read, &handler, &queue_tx, &config, &shutdown).await;
        // closing the queue lets the writer finish once pending responses
        // are out
        drop(queue_tx);

        let write_result = match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(SendError::invalid_body(format!("writer task failed: {e}")).into()),
        };

        read_result.and(write_result)
    }
}

async fn read_loop<R, H>(
    framed_read: &mut FramedRead<R, RequestDecoder>,
    handler: &Arc<H>,
    queue_tx: &mpsc::Sender<WriteItem>,
    config: &ConnectionConfig,
    shutdown: &CancellationToken,
) -> Result<(), HttpError>
where
    R: AsyncRead + Unpin,
    H: Handler + Send + Sync + 'static,
    H::RespBody: Body<Data = Bytes> + Send + 'static,
    <H::RespBody as Body>::Error: Into<BoxError>,
{
    let mut sequence: u64 = 0;

    loop {
        let next = select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("connection interrupted by shutdown");
                return Ok(());
            }
            next = timeout(config.idle_timeout, framed_read.next()) => next,
        };

        let message = match next {
            Err(_) => {
                debug!("idle timeout expired, closing connection");
                return Ok(());
            }
            Ok(None) => {
                debug!("peer closed the connection");
                return Ok(());
            }
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                error!(error = %e, "failed to parse request");
                let status = if e.is_resource_limit() {
                    StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
                } else {
                    StatusCode::BAD_REQUEST
                };
                send_courtesy_response(queue_tx, sequence + 1, status).await;
                return Err(e.into());
            }
        };

        let (head, framing) = match message {
            Message::Header(header) => header,
            Message::Payload(_) => {
                send_courtesy_response(queue_tx, sequence + 1, StatusCode::BAD_REQUEST).await;
                return Err(ParseError::invalid_body("expected request head but read body payload").into());
            }
        };

        sequence += 1;
        let keep_alive = head.keep_alive();
        debug!(sequence, method = %head.method(), uri = %head.uri(), "read request head");

        if head.expects_continue() && !framing.is_empty() {
            if queue_tx.send(WriteItem::Interim { sequence }).await.is_err() {
                return Ok(());
            }
        }

        // reserving the slot before the handler runs is what fixes the
        // response order to the request order
        let (response_tx, response_rx) = oneshot::channel();
        if queue_tx.send(WriteItem::Response(ResponseSlot { sequence, ready: response_rx })).await.is_err() {
            // writer is gone, most likely after a close-marked response
            return Ok(());
        }

        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let request = head.body(ReqBody::new(body_rx, framing));
        dispatch_handler(handler.clone(), request, response_tx);

        if let Err(e) = pump_request_body(framed_read, body_tx, config, shutdown).await {
            if let HttpError::RequestError { source } = &e {
                let status = if source.is_resource_limit() {
                    StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
                } else {
                    StatusCode::BAD_REQUEST
                };
                send_courtesy_response(queue_tx, sequence + 1, status).await;
            }
            return Err(e);
        }

        if !keep_alive {
            debug!(sequence, "request forbids connection reuse");
            return Ok(());
        }
    }
}

/// Runs one handler invocation in its own task and completes the
/// response slot with its result, or with a `500` if it failed.
fn dispatch_handler<H>(handler: Arc<H>, request: http::Request<ReqBody>, response_tx: oneshot::Sender<http::Response<OutboundBody>>)
where
    H: Handler + Send + Sync + 'static,
    H::RespBody: Body<Data = Bytes> + Send + 'static,
    <H::RespBody as Body>::Error: Into<BoxError>,
{
    tokio::spawn(async move {
        let is_head = request.method() == Method::HEAD;

        let response = match handler.call(request).await {
            // a HEAD reply carries no body bytes no matter what the
            // handler produced
            Ok(response) if is_head => response.map(|_| empty_body()),
            Ok(response) => response.map(|body| body.map_err(Into::into).boxed_unsync()),
            Err(e) => {
                let e: BoxError = e.into();
                error!(error = %e, "handler failed, answering 500");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, false)
            }
        };

        // the writer may already be gone if the connection broke
        let _ = response_tx.send(response);
    });
}

/// Forwards decoded body chunks to the handler until the end-of-body
/// marker. If the handler drops its body early the remaining chunks are
/// drained and discarded so the read position still lands on the next
/// request head.
async fn pump_request_body<R>(
    framed_read: &mut FramedRead<R, RequestDecoder>,
    body_tx: mpsc::Sender<Result<Bytes, ParseError>>,
    config: &ConnectionConfig,
    shutdown: &CancellationToken,
) -> Result<(), HttpError>
where
    R: AsyncRead + Unpin,
{
    let mut discarded: u64 = 0;

    loop {
        let next = select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("body read interrupted by shutdown");
                let _ = body_tx.send(Err(ParseError::truncated("request body"))).await;
                return Ok(());
            }
            next = timeout(config.read_timeout, framed_read.next()) => match next {
                Ok(next) => next,
                Err(_) => {
                    let _ = body_tx.send(Err(ParseError::truncated("request body"))).await;
                    return Err(HttpError::Timeout { phase: "request body" });
                }
            },
        };

        match next {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                if discarded > 0 {
                    discarded += bytes.len() as u64;
                    continue;
                }
                if let Err(unsent) = body_tx.send(Ok(bytes)).await {
                    // handler dropped the body; keep draining
                    if let Ok(bytes) = unsent.0 {
                        discarded = bytes.len().max(1) as u64;
                    } else {
                        discarded = 1;
                    }
                }
            }

            Some(Ok(Message::Payload(PayloadItem::Eof))) => {
                if discarded > 0 {
                    debug!(discarded, "drained unread request body");
                }
                return Ok(());
            }

            Some(Ok(Message::Header(_))) => {
                return Err(ParseError::invalid_body("expected body payload but read a request head").into());
            }

            Some(Err(e)) => {
                error!(error = %e, "failed to parse request body");
                let _ = body_tx.send(Err(ParseError::invalid_body(e.to_string()))).await;
                return Err(e.into());
            }

            None => {
                let _ = body_tx.send(Err(ParseError::truncated("request body"))).await;
                return Err(ParseError::truncated("request body").into());
            }
        }
    }
}

async fn send_courtesy_response(queue_tx: &mpsc::Sender<WriteItem>, sequence: u64, status: StatusCode) {
    let (tx, rx) = oneshot::channel();
    // the response is ready before the slot is queued
    let _ = tx.send(error_response(status, true));
    let _ = queue_tx.send(WriteItem::Response(ResponseSlot { sequence, ready: rx })).await;
}
