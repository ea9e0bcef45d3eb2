use crate::frame::Frame;

/// The connection-side services a stream needs: writing frames and being
/// unlinked from the demultiplexing table once it finalizes.
///
/// `closed_locally` is set when the stream ended by sending `Close`, so
/// frames the peer already had in flight for it are dropped rather than
/// treated as a protocol violation.
pub(crate) trait StreamSink: Send + Sync {
    fn send_frame(&self, frame: Frame);

    fn release_stream(&self, stream_id: u32, closed_locally: bool);
}
