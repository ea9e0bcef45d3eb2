use crate::{frame::FrameKind, metadata::Metadata, status::Status};

/// One wire unit: a stream id plus exactly one protocol variant.
///
/// A frame maps to exactly one transport message. Unlike byte-stream
/// transports, the tunnel never splits or coalesces frames, so there is no
/// length prefix for the frame as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The logical call this frame belongs to.
    pub stream_id: u32,

    /// The single variant carried by this frame.
    pub body: FrameBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    /// Opens a stream and names the RPC method path.
    Call { method: String },

    /// Header (first occurrence) or trailer (later occurrence).
    Metadata(Metadata),

    /// Grants `count` bytes of send credit to the receiver of this frame.
    Ready { count: u32 },

    /// One application message.
    Payload(Vec<u8>),

    /// The sender will send no further payloads on this stream.
    End,

    /// Terminal outcome of the call; finalized by a following `End`.
    Status(Status),

    /// Abrupt, unilateral termination of the stream.
    Close,
}

impl FrameBody {
    pub fn kind(&self) -> FrameKind {
        match self {
            FrameBody::Call { .. } => FrameKind::Call,
            FrameBody::Metadata(_) => FrameKind::Metadata,
            FrameBody::Ready { .. } => FrameKind::Ready,
            FrameBody::Payload(_) => FrameKind::Payload,
            FrameBody::End => FrameKind::End,
            FrameBody::Status(_) => FrameKind::Status,
            FrameBody::Close => FrameKind::Close,
        }
    }
}

impl Frame {
    pub fn new(stream_id: u32, body: FrameBody) -> Self {
        Self { stream_id, body }
    }

    pub fn kind(&self) -> FrameKind {
        self.body.kind()
    }
}
