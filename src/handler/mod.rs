//! Application handler abstraction.
//!
//! A [`Handler`] receives a fully typed `http::Request` whose body streams
//! straight off the connection, and returns an `http::Response` whose body
//! is streamed back. [`make_handler`] lifts a plain async function into a
//! handler without a dedicated struct.
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::Full;
//! use h1_engine::handler::make_handler;
//! use h1_engine::protocol::body::ReqBody;
//!
//! async fn hello(_req: Request<ReqBody>) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
//!     Ok(Response::new(Full::new(Bytes::from_static(b"hello"))))
//! }
//!
//! let handler = make_handler(hello);
//! ```

use std::future::Future;

use async_trait::async_trait;

use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;
use crate::protocol::BoxError;

#[async_trait]
pub trait Handler<ReqB = ReqBody> {
    type RespBody: Body;
    type Error: Into<BoxError>;

    async fn call(&self, req: Request<ReqB>) -> Result<Response<Self::RespBody>, Self::Error>;
}

/// Adapter turning an async `Fn(Request) -> Result<Response, _>` into a
/// [`Handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<ReqB, RespBody, Err, F, Fut> Handler<ReqB> for HandlerFn<F>
where
    RespBody: Body,
    ReqB: Send + 'static,
    F: Fn(Request<ReqB>) -> Fut + Send + Sync,
    Err: Into<BoxError>,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request<ReqB>) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, ReqB, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<BoxError>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<ReqB>) -> Ret,
{
    HandlerFn { f }
}
