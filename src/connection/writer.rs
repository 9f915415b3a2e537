//! Ordered response writer.
//!
//! Responses for pipelined requests may finish in any order, but the wire
//! demands they leave in request order. The reader loop reserves a slot in
//! a bounded queue for every request as soon as its head is parsed; the
//! writer task consumes slots strictly in queue order, waiting on each
//! slot's channel until its response is ready. A slow first handler
//! therefore holds back the bytes of faster later ones without holding
//! back their computation.
//!
//! Interim `100 Continue` lines travel through the same queue so they
//! cannot overtake an earlier response.

use bytes::Bytes;
use http::header::CONNECTION;
use http::{HeaderMap, HeaderValue, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::FramedWrite;
use tracing::{debug, error};

use futures::SinkExt;

use crate::codec::ResponseEncoder;
use crate::protocol::{BodyFraming, BoxError, HttpError, Message, PayloadItem, ResponseHead, SendError};

/// The body type every response is normalized to before it reaches the
/// writer.
pub type OutboundBody = UnsyncBoxBody<Bytes, BoxError>;

type OutMessage = Message<(ResponseHead, BodyFraming)>;

/// A reserved position in the response order.
pub(crate) struct ResponseSlot {
    pub(crate) sequence: u64,
    pub(crate) ready: oneshot::Receiver<Response<OutboundBody>>,
}

pub(crate) enum WriteItem {
    /// A raw `100 Continue` line, written between full responses.
    Interim { sequence: u64 },
    Response(ResponseSlot),
}

/// Consumes the write queue until it closes or a written response demands
/// the connection be closed, then shuts the writer down.
pub(crate) async fn drain_write_queue<W>(
    mut queue: mpsc::Receiver<WriteItem>,
    mut framed_write: FramedWrite<W, ResponseEncoder>,
) -> Result<(), HttpError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = queue.recv().await {
        match item {
            WriteItem::Interim { sequence } => {
                debug!(sequence, "writing interim 100 continue");
                flush(&mut framed_write).await?;
                let writer = framed_write.get_mut();
                writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
                writer.flush().await.map_err(SendError::io)?;
            }

            WriteItem::Response(ResponseSlot { sequence, ready }) => {
                let response = match ready.await {
                    Ok(response) => response,
                    Err(_) => {
                        error!(sequence, "response producer dropped without answering");
                        return Err(SendError::invalid_body("response producer dropped without answering").into());
                    }
                };

                debug!(sequence, status = %response.status(), "writing response");
                let closing = write_response(&mut framed_write, response).await?;
                if closing {
                    queue.close();
                    break;
                }
            }
        }
    }

    flush(&mut framed_write).await?;
    framed_write.get_mut().shutdown().await.map_err(SendError::io)?;
    Ok(())
}

/// Writes one full response, streaming its body through the framed
/// encoder. Returns whether the response forbids reusing the connection.
async fn write_response<W>(
    framed_write: &mut FramedWrite<W, ResponseEncoder>,
    response: Response<OutboundBody>,
) -> Result<bool, HttpError>
where
    W: AsyncWrite + Unpin,
{
    let (parts, mut body) = response.into_parts();

    let framing = {
        let size_hint = body.size_hint();
        match size_hint.exact() {
            Some(0) => BodyFraming::None,
            Some(length) => BodyFraming::Fixed(length),
            None => BodyFraming::Chunked,
        }
    };

    let closing = has_close_token(&parts.headers) || parts.version == Version::HTTP_10 || framing.is_until_close();

    let head = Response::from_parts(parts, ());
    framed_write.feed(Message::Header((head, framing))).await?;

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                // trailers have no place in an HTTP/1.1 non-chunked reply;
                // data frames are the only thing forwarded
                if let Ok(data) = frame.into_data() {
                    framed_write.feed(Message::Payload(PayloadItem::Chunk(data))).await?;
                }
            }
            Some(Err(e)) => return Err(SendError::invalid_body(format!("response body failed: {e}")).into()),
            None => {
                framed_write.feed(Message::Payload(PayloadItem::Eof)).await?;
                flush(framed_write).await?;
                return Ok(closing);
            }
        }
    }
}

async fn flush<W>(framed_write: &mut FramedWrite<W, ResponseEncoder>) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
{
    SinkExt::<OutMessage>::flush(framed_write).await
}

fn has_close_token(headers: &HeaderMap) -> bool {
    headers
        .get(CONNECTION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.split(',').any(|part| part.trim().eq_ignore_ascii_case("close")))
}

/// An always-empty response body.
pub fn empty_body() -> OutboundBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync()
}

/// A bare status-only response, optionally marked `Connection: close`.
pub(crate) fn error_response(status: StatusCode, close: bool) -> Response<OutboundBody> {
    let mut builder = Response::builder().status(status);
    if close {
        builder = builder.header(CONNECTION, HeaderValue::from_static("close"));
    }
    builder.body(empty_body()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn full_body(content: &'static [u8]) -> OutboundBody {
        Full::new(Bytes::from_static(content)).map_err(|never| match never {}).boxed_unsync()
    }

    fn ok_response(content: &'static [u8]) -> Response<OutboundBody> {
        Response::builder().status(StatusCode::OK).body(full_body(content)).unwrap()
    }

    async fn read_all(mut reader: impl tokio::io::AsyncRead + Unpin) -> String {
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn responses_leave_in_slot_order_even_when_ready_out_of_order() {
        let (client, server) = tokio::io::duplex(4 * 1024);
        let framed_write = FramedWrite::new(server, ResponseEncoder::new());

        let (queue_tx, queue_rx) = mpsc::channel(4);
        let writer = tokio::spawn(drain_write_queue(queue_rx, framed_write));

        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        queue_tx.send(WriteItem::Response(ResponseSlot { sequence: 1, ready: first_rx })).await.unwrap();
        queue_tx.send(WriteItem::Response(ResponseSlot { sequence: 2, ready: second_rx })).await.unwrap();
        drop(queue_tx);

        // the second response completes first
        second_tx.send(ok_response(b"second")).ok().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        first_tx.send(ok_response(b"first")).ok().unwrap();

        writer.await.unwrap().unwrap();

        let wire = read_all(client).await;
        let first_at = wire.find("first").unwrap();
        let second_at = wire.find("second").unwrap();
        assert!(first_at < second_at, "first response must be written first: {wire}");
    }

    #[tokio::test]
    async fn interim_continue_precedes_the_response() {
        let (client, server) = tokio::io::duplex(4 * 1024);
        let framed_write = FramedWrite::new(server, ResponseEncoder::new());

        let (queue_tx, queue_rx) = mpsc::channel(4);
        let writer = tokio::spawn(drain_write_queue(queue_rx, framed_write));

        queue_tx.send(WriteItem::Interim { sequence: 1 }).await.unwrap();
        let (tx, rx) = oneshot::channel();
        tx.send(ok_response(b"done")).ok().unwrap();
        queue_tx.send(WriteItem::Response(ResponseSlot { sequence: 1, ready: rx })).await.unwrap();
        drop(queue_tx);

        writer.await.unwrap().unwrap();

        let wire = read_all(client).await;
        assert!(wire.starts_with("HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\n"), "{wire}");
    }

    #[tokio::test]
    async fn abandoned_slot_fails_the_writer() {
        let (_client, server) = tokio::io::duplex(4 * 1024);
        let framed_write = FramedWrite::new(server, ResponseEncoder::new());

        let (queue_tx, queue_rx) = mpsc::channel(4);
        let writer = tokio::spawn(drain_write_queue(queue_rx, framed_write));

        let (tx, rx) = oneshot::channel::<Response<OutboundBody>>();
        queue_tx.send(WriteItem::Response(ResponseSlot { sequence: 1, ready: rx })).await.unwrap();
        drop(tx);
        drop(queue_tx);

        assert!(writer.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn close_marked_response_stops_the_queue() {
        let (client, server) = tokio::io::duplex(4 * 1024);
        let framed_write = FramedWrite::new(server, ResponseEncoder::new());

        let (queue_tx, queue_rx) = mpsc::channel(4);
        let writer = tokio::spawn(drain_write_queue(queue_rx, framed_write));

        let (tx, rx) = oneshot::channel();
        tx.send(error_response(StatusCode::BAD_REQUEST, true)).ok().unwrap();
        queue_tx.send(WriteItem::Response(ResponseSlot { sequence: 1, ready: rx })).await.unwrap();

        writer.await.unwrap().unwrap();
        drop(queue_tx);

        let wire = read_all(client).await;
        assert!(wire.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{wire}");
        assert!(wire.contains("connection: close\r\n"), "{wire}");
    }
}
