use crate::route_guide::{
    Feature, GET_FEATURE, LIST_FEATURES, Point, RECORD_ROUTE, ROUTE_CHAT, Rectangle, RouteNote,
    RouteSummary,
};
use std::sync::Arc;
use tunnelrpc::{Channel, StatusError};
use tunnelrpc_service::{
    ClientStreamingCall, ExtraCallOptions, MessageObserver, ResponseStream, TypedStreamWriter,
    UnaryResponse, call_client_streaming, call_server_streaming, call_unary, invoke,
    server_streaming,
};

/// RouteGuide stub. Holds the channel and forwards to the shared call helpers.
#[derive(Clone)]
pub struct RouteGuideClient {
    channel: Channel,
}

impl RouteGuideClient {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub async fn get_feature(&self, point: &Point) -> Result<UnaryResponse<Feature>, StatusError> {
        call_unary(&self.channel, &GET_FEATURE, point, ExtraCallOptions::default()).await
    }

    pub async fn list_features(
        &self,
        rectangle: &Rectangle,
    ) -> Result<ResponseStream<Feature>, StatusError> {
        server_streaming(
            &self.channel,
            &LIST_FEATURES,
            rectangle,
            ExtraCallOptions::default(),
        )
        .await
    }

    pub async fn list_features_with(
        &self,
        rectangle: &Rectangle,
        observer: Arc<dyn MessageObserver<Feature>>,
    ) -> Result<TypedStreamWriter<Rectangle>, StatusError> {
        call_server_streaming(
            &self.channel,
            &LIST_FEATURES,
            rectangle,
            observer,
            ExtraCallOptions::default(),
        )
        .await
    }

    pub fn record_route(&self) -> ClientStreamingCall<Point, RouteSummary> {
        call_client_streaming(&self.channel, &RECORD_ROUTE, ExtraCallOptions::default())
    }

    pub fn route_chat(
        &self,
        observer: Arc<dyn MessageObserver<RouteNote>>,
    ) -> TypedStreamWriter<RouteNote> {
        invoke(
            &self.channel,
            &ROUTE_CHAT,
            observer,
            ExtraCallOptions::default(),
        )
    }
}
