/// Number of decoded messages a [`ResponseStream`](crate::ResponseStream)
/// buffers before it stops returning credit to the peer.
///
/// This counts *messages*, not bytes. Once the buffer is full, the stream's
/// message handler waits for the consumer, which in turn withholds `Ready`
/// credit and applies backpressure all the way to the sender.
pub const DEFAULT_RESPONSE_STREAM_BUFFER_SIZE: usize = 8;
