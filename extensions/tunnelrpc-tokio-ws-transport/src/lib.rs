mod ws_connector;
pub use ws_connector::WsConnector;

mod ws_connector_config;
pub use ws_connector_config::*;

use tunnelrpc::{Channel, ChannelConfig, spawner::TokioSpawner};

/// A channel dialing `url` with default settings.
///
/// Must be called from within a tokio runtime.
pub fn ws_channel(url: impl Into<String>) -> Channel {
    ws_channel_with_config(WsConnectorConfig::new(url), ChannelConfig::default())
}

pub fn ws_channel_with_config(
    connector_config: WsConnectorConfig,
    channel_config: ChannelConfig,
) -> Channel {
    Channel::with_config(
        WsConnector::new(connector_config),
        TokioSpawner,
        channel_config,
    )
}
