mod connection_error;
mod connection_listener;
mod tunnel_connection;

pub use connection_error::ConnectionError;
pub use connection_listener::ConnectionListener;
pub use tunnel_connection::Connection;
