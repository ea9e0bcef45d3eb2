pub mod channel;
pub mod connection;
pub mod constants;
pub mod flow_control;
pub mod frame;
pub mod metadata;
pub mod pool;
pub mod spawner;
pub mod status;
pub mod stream;
pub mod transport;
pub mod utils;

pub use channel::{Channel, ChannelConfig, StreamWriter};
pub use connection::{Connection, ConnectionError};
pub use metadata::Metadata;
pub use status::{Code, Status, StatusError};
pub use stream::{CallOptions, Stream, StreamObserver};
