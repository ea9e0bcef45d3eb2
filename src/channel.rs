mod channel_config;
mod stream_writer;
mod tunnel_channel;

pub use channel_config::ChannelConfig;
pub use stream_writer::StreamWriter;
pub use tunnel_channel::Channel;
