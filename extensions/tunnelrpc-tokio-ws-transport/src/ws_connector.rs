use crate::WsConnectorConfig;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Error as WsError,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderValue, header::SEC_WEBSOCKET_PROTOCOL},
        protocol::Message as WsMessage,
    },
};
use tracing::{debug, trace, warn};
use tunnelrpc::transport::{
    TransportConnector, TransportError, TransportObserver, TransportWriter,
};

enum WsCommand {
    Send(Vec<u8>),
    Close,
}

/// Queues outbound work for the connection task.
struct WsWriter {
    commands: UnboundedSender<WsCommand>,
}

impl TransportWriter for WsWriter {
    fn send(&self, bytes: Vec<u8>) {
        // Fails only once the task has exited, after `on_close`
        let _ = self.commands.send(WsCommand::Send(bytes));
    }

    fn close(&self) {
        let _ = self.commands.send(WsCommand::Close);
    }
}

/// Opens one WebSocket per pooled connection.
///
/// `connect` spawns onto the ambient tokio runtime, so the channel using
/// this connector must be created and driven from within one.
#[derive(Debug, Clone)]
pub struct WsConnector {
    config: Arc<WsConnectorConfig>,
}

impl WsConnector {
    pub fn new(config: WsConnectorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WsConnectorConfig {
        &self.config
    }
}

impl TransportConnector for WsConnector {
    fn connect(&self, observer: Arc<dyn TransportObserver>) -> Arc<dyn TransportWriter> {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(Arc::clone(&self.config), observer, receiver));
        Arc::new(WsWriter { commands })
    }
}

fn build_request(config: &WsConnectorConfig) -> Result<Request, WsError> {
    let mut request = config.url.as_str().into_client_request()?;
    let protocol = HeaderValue::from_str(&config.subprotocol)
        .map_err(|err| WsError::HttpFormat(err.into()))?;
    request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);
    Ok(request)
}

async fn run_connection(
    config: Arc<WsConnectorConfig>,
    observer: Arc<dyn TransportObserver>,
    mut commands: UnboundedReceiver<WsCommand>,
) {
    let connected = match build_request(&config) {
        Ok(request) => connect_async(request).await,
        Err(err) => Err(err),
    };

    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(err) => {
            warn!(url = %config.url, error = %err, "websocket connect failed");
            tokio::time::sleep(config.connect_failure_delay).await;
            observer.on_close(TransportError::new(format!("connect failed: {err}")));
            return;
        }
    };

    debug!(url = %config.url, "websocket connected");
    let (mut sink, mut source) = ws_stream.split();
    observer.on_ready();

    let error = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(WsCommand::Send(bytes)) => {
                    if let Err(err) = sink.send(WsMessage::Binary(Bytes::from(bytes))).await {
                        break TransportError::new(err.to_string());
                    }
                }
                Some(WsCommand::Close) | None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    let _ = sink.close().await;
                    break TransportError::new("closed locally");
                }
            },
            message = source.next() => match message {
                Some(Ok(WsMessage::Binary(bytes))) => observer.on_message(&bytes),
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame
                        .map(|frame| frame.reason.as_str().to_owned())
                        .unwrap_or_default();
                    break TransportError::new(format!("closed by peer: {reason}"));
                }
                Some(Ok(other)) => trace!(?other, "ignoring non-binary websocket message"),
                Some(Err(err)) => break TransportError::new(err.to_string()),
                None => break TransportError::new("connection reset"),
            },
        }
    };

    debug!(url = %config.url, error = %error, "websocket closed");
    observer.on_close(error);
}
