use bytes::{Buf, Bytes};

/// One frame of an HTTP message stream: either a parsed head or a piece of
/// body payload.
///
/// The generic parameter `T` is the head type produced by the decoder (a
/// request or response head paired with its body framing), while `Data` is
/// the payload chunk type.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    /// The parsed message head.
    Header(T),
    /// A chunk of body payload or the end-of-body marker.
    Payload(PayloadItem<Data>),
}

/// An item in a message's body stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of body bytes.
    Chunk(Data),
    /// End of the body. After this, the connection's read position is at the
    /// first byte of the next message.
    Eof,
}

impl<T> Message<T> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    /// Converts the message into its payload item, if it is one.
    pub fn into_payload_item(self) -> Option<PayloadItem> {
        match self {
            Message::Header(_) => None,
            Message::Payload(payload_item) => Some(payload_item),
        }
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns a reference to the contained bytes if this is a chunk.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the item and returns the contained bytes if this is a chunk.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
