mod call_options;
mod rpc_stream;
mod stream_observer;
mod stream_sink;

pub use call_options::CallOptions;
pub use rpc_stream::Stream;
pub use stream_observer::StreamObserver;

pub(crate) use rpc_stream::{StreamShared, drive_stream};
pub(crate) use stream_sink::StreamSink;
