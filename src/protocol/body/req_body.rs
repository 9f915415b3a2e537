use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::mpsc;

use crate::protocol::{BodyFraming, ParseError};

/// Streaming request body handed to the application handler.
///
/// The connection loop pumps decoded payload chunks into a bounded channel;
/// this type is the consuming end, exposed through the standard
/// `http_body::Body` interface. The bounded channel is the engine's
/// backpressure point: a handler that stops reading eventually suspends the
/// loop's pump, which in turn stops reading from the socket.
///
/// Dropping the body early is allowed; the connection loop drains and
/// discards the remaining chunks to keep the connection reusable.
pub struct ReqBody {
    receiver: mpsc::Receiver<Result<Bytes, ParseError>>,
    size_hint: SizeHint,
}

impl ReqBody {
    pub(crate) fn new(receiver: mpsc::Receiver<Result<Bytes, ParseError>>, framing: BodyFraming) -> Self {
        let size_hint = match framing {
            BodyFraming::None => SizeHint::with_exact(0),
            BodyFraming::Fixed(length) => SizeHint::with_exact(length),
            BodyFraming::Chunked | BodyFraming::UntilClose => SizeHint::new(),
        };
        Self { receiver, size_hint }
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(Ok(bytes))) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            // channel closed: the pump saw end-of-body
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> SizeHint {
        self.size_hint.clone()
    }
}

impl fmt::Debug for ReqBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqBody").finish_non_exhaustive()
    }
}
