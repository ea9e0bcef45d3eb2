use std::time::Duration;

/// WebSocket subprotocol offered on every connect.
pub const DEFAULT_SUBPROTOCOL: &str = "tunnelrpc-1";

/// How long a failed connect attempt waits before reporting the close.
///
/// The pool replaces a closed connection immediately, so this is what keeps
/// an unreachable endpoint from being redialed in a tight loop.
pub const DEFAULT_CONNECT_FAILURE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConnectorConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,

    /// Sent as `Sec-WebSocket-Protocol`.
    pub subprotocol: String,

    pub connect_failure_delay: Duration,
}

impl WsConnectorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subprotocol: DEFAULT_SUBPROTOCOL.to_string(),
            connect_failure_delay: DEFAULT_CONNECT_FAILURE_DELAY,
        }
    }

    pub fn with_subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = subprotocol.into();
        self
    }

    pub fn with_connect_failure_delay(mut self, delay: Duration) -> Self {
        self.connect_failure_delay = delay;
        self
    }
}
