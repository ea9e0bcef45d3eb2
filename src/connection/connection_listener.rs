use crate::connection::Connection;
use std::sync::Arc;

/// Lifecycle notifications a connection reports to whoever owns it,
/// normally the [`ConnectionPool`](crate::pool::ConnectionPool).
pub trait ConnectionListener: Send + Sync {
    /// The transport became ready; the connection can now carry calls.
    fn connection_active(&self, connection: &Arc<Connection>);

    /// The connection was torn down. Called once, before its open streams
    /// are finalized.
    fn connection_closed(&self, connection: &Arc<Connection>);
}

/// For connections that nobody tracks.
impl ConnectionListener for () {
    fn connection_active(&self, _connection: &Arc<Connection>) {}

    fn connection_closed(&self, _connection: &Arc<Connection>) {}
}
