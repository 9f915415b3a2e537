use crate::protocol::{PayloadItem, SendError};
use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::warn;

/// Writes a fixed-length body, refusing to emit more than the declared
/// number of bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

impl Encoder<PayloadItem> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(bytes) => {
                if bytes.is_empty() {
                    return Ok(());
                }
                if bytes.len() as u64 > self.remaining {
                    warn!(remaining = self.remaining, len = bytes.len(), "response body exceeds declared content-length");
                    return Err(SendError::invalid_body("body exceeds declared content-length"));
                }
                self.remaining -= bytes.len() as u64;
                dst.extend_from_slice(&bytes);
                Ok(())
            }
            PayloadItem::Eof => {
                if self.remaining > 0 {
                    warn!(remaining = self.remaining, "response body ended short of declared content-length");
                    return Err(SendError::invalid_body("body shorter than declared content-length"));
                }
                Ok(())
            }
        }
    }
}
