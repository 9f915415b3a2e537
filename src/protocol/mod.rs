//! Core protocol types shared by the codec and the connection loop.
//!
//! - [`Message`] / [`PayloadItem`]: frames produced by the decoders.
//! - [`BodyFraming`]: the tagged body-delimiting mode of one message.
//! - [`RequestHead`] / [`ResponseHead`]: parsed start line plus headers.
//! - [`body::ReqBody`]: the lazy, backpressured request body stream handed
//!   to application handlers.
//! - [`HttpError`] / [`ParseError`] / [`SendError`]: the error taxonomy.
//!   Parse errors keep resource-limit failures distinguishable from
//!   protocol-syntax failures.

mod message;
pub use message::Message;
pub use message::PayloadItem;

mod framing;
pub use framing::BodyFraming;

mod request;
pub use request::RequestHead;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::BoxError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
