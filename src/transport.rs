use std::{fmt, io, sync::Arc};

/// Outbound half of one physical, message-oriented duplex connection.
///
/// Implementations must deliver messages reliably and in order between
/// `on_ready` and `on_close`. Both methods are called while the connection
/// holds internal locks: they must only enqueue work and must not call back
/// into the [`TransportObserver`] synchronously.
pub trait TransportWriter: Send + Sync {
    /// Queues one binary message for delivery.
    fn send(&self, bytes: Vec<u8>);

    /// Requests the transport to close. `on_close` is expected to follow.
    fn close(&self);
}

/// Inbound callbacks a transport drives.
pub trait TransportObserver: Send + Sync {
    /// The transport can now carry messages in both directions.
    fn on_ready(&self);

    /// One complete binary message arrived.
    fn on_message(&self, bytes: &[u8]);

    /// The transport closed. No further callbacks follow.
    fn on_close(&self, error: TransportError);
}

/// Opens new physical transports on behalf of the connection pool.
pub trait TransportConnector: Send + Sync + 'static {
    /// Starts connecting, reporting progress to `observer`. Returns the
    /// writer immediately; it may be used before `on_ready` fires.
    fn connect(&self, observer: Arc<dyn TransportObserver>) -> Arc<dyn TransportWriter>;
}

impl<F> TransportConnector for F
where
    F: Fn(Arc<dyn TransportObserver>) -> Arc<dyn TransportWriter> + Send + Sync + 'static,
{
    fn connect(&self, observer: Arc<dyn TransportObserver>) -> Arc<dyn TransportWriter> {
        self(observer)
    }
}

/// Why a transport closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport closed: {}", self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::new(err.to_string())
    }
}
