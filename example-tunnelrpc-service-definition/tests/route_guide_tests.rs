mod common;

use common::{FORBIDDEN, features, loopback_channel};
use example_tunnelrpc_service_definition::route_guide::{
    Feature, Point, Rectangle, RouteGuideClient, RouteNote, SERVICE,
};
use futures::StreamExt;
use std::{sync::Arc, sync::Mutex, time::Duration};
use tokio::sync::oneshot;
use tunnelrpc::{Code, Metadata, StatusError};
use tunnelrpc_service::{MessageObserver, MethodKind};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn get_feature_returns_feature_with_header_and_trailer() {
    let (channel, _server) = loopback_channel();
    let client = RouteGuideClient::new(channel);

    let expected = features()[0].clone();
    let response = tokio::time::timeout(TIMEOUT, client.get_feature(&expected.location))
        .await
        .expect("timed out")
        .expect("call failed");

    assert_eq!(response.message, expected);
    assert_eq!(
        response.header.as_ref().and_then(|h| h.get_first("x-method")),
        Some("/routeguide.RouteGuide/GetFeature")
    );
    assert_eq!(response.trailer.get_first("x-served-by"), Some("loopback"));
}

#[tokio::test]
async fn get_feature_for_unknown_point_returns_unnamed_feature() {
    let (channel, _server) = loopback_channel();
    let client = RouteGuideClient::new(channel);

    let point = Point::from_degrees(12.5, 12.5);
    let response = client.get_feature(&point).await.unwrap();

    assert_eq!(response.message.name, "");
    assert_eq!(response.message.location, point);
}

#[tokio::test]
async fn get_feature_error_status_reaches_caller() {
    let (channel, _server) = loopback_channel();
    let client = RouteGuideClient::new(channel);

    let err = client.get_feature(&FORBIDDEN).await.unwrap_err();

    assert_eq!(err.known_code(), Some(Code::PermissionDenied));
    assert_eq!(err.message(), "point is off limits");
}

#[tokio::test]
async fn list_features_streams_features_inside_rectangle() {
    let (channel, _server) = loopback_channel();
    let client = RouteGuideClient::new(channel);

    let rectangle = Rectangle {
        lo: Point::from_degrees(40.0, -75.0),
        hi: Point::from_degrees(41.0, -74.0),
    };

    let mut stream = client.list_features(&rectangle).await.unwrap();
    let mut received = Vec::new();
    while let Some(item) = tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap() {
        received.push(item.expect("stream failed"));
    }

    let expected: Vec<Feature> = features()
        .into_iter()
        .filter(|f| rectangle.contains(&f.location))
        .collect();
    assert_eq!(received, expected);
    assert_eq!(received.len(), 2);
    assert!(stream.header().is_some());
    assert_eq!(
        stream.trailer().and_then(|t| t.get_first("x-served-by").map(str::to_owned)),
        Some("loopback".to_owned())
    );
}

type Outcome = Result<Metadata, StatusError>;

struct Collect<T> {
    messages: Mutex<Vec<T>>,
    done: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl<T> Collect<T> {
    fn new() -> (Arc<Self>, oneshot::Receiver<Outcome>) {
        let (done, ended) = oneshot::channel();
        let observer = Arc::new(Self {
            messages: Mutex::new(Vec::new()),
            done: Mutex::new(Some(done)),
        });
        (observer, ended)
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> MessageObserver<T> for Collect<T> {
    async fn on_message(&self, message: T) -> Result<(), StatusError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    fn on_end(&self, result: Result<Metadata, StatusError>) {
        if let Some(done) = self.done.lock().unwrap().take() {
            let _ = done.send(result);
        }
    }
}

#[tokio::test]
async fn list_features_with_observer_sees_every_feature_then_end() {
    let (channel, _server) = loopback_channel();
    let client = RouteGuideClient::new(channel);

    let everywhere = Rectangle {
        lo: Point::from_degrees(-90.0, -180.0),
        hi: Point::from_degrees(90.0, 180.0),
    };

    let (observer, ended) = Collect::<Feature>::new();
    client
        .list_features_with(&everywhere, observer.clone())
        .await
        .unwrap();

    let outcome = tokio::time::timeout(TIMEOUT, ended).await.unwrap().unwrap();
    assert!(outcome.is_ok());
    assert_eq!(*observer.messages.lock().unwrap(), features());
}

#[tokio::test]
async fn record_route_summarizes_streamed_points() {
    let (channel, _server) = loopback_channel();
    let client = RouteGuideClient::new(channel);

    let call = client.record_route();
    let known = features();
    let route = [
        known[0].location,
        Point::from_degrees(10.0, 10.0),
        known[1].location,
        Point::from_degrees(20.0, 20.0),
    ];
    for point in &route {
        call.send(point).await.unwrap();
    }

    let response = tokio::time::timeout(TIMEOUT, call.finish())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.message.point_count, 4);
    assert_eq!(response.message.feature_count, 2);
}

#[tokio::test]
async fn route_chat_echoes_notes_in_order() {
    let (channel, _server) = loopback_channel();
    let client = RouteGuideClient::new(channel);

    let (observer, ended) = Collect::<RouteNote>::new();
    let writer = client.route_chat(observer.clone());

    let notes: Vec<RouteNote> = (0..3)
        .map(|i| RouteNote {
            location: Point::from_degrees(i as f64, 0.0),
            message: format!("note {i}"),
        })
        .collect();
    for note in &notes {
        writer.send(note).await.unwrap();
    }
    writer.end();

    let outcome = tokio::time::timeout(TIMEOUT, ended).await.unwrap().unwrap();
    assert!(outcome.is_ok());
    assert_eq!(*observer.messages.lock().unwrap(), notes);
}

#[tokio::test]
async fn calls_succeed_again_after_server_drops_connections() {
    let (channel, server) = loopback_channel();
    let client = RouteGuideClient::new(channel);

    let point = features()[2].location;
    client.get_feature(&point).await.unwrap();
    let before = server.connect_count();

    server.disconnect_all();

    let pool = client.channel().pool();
    tokio::time::timeout(TIMEOUT, async {
        while server.connect_count() < before + pool.target_size()
            || pool.active_count() < pool.target_size()
        {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("pool never reconnected");

    let response = tokio::time::timeout(TIMEOUT, client.get_feature(&point))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.message.name, "Null Island");
    assert!(server.connect_count() > before);
}

#[test]
fn service_descriptor_lists_every_method() {
    assert_eq!(SERVICE.name, "routeguide.RouteGuide");

    let kinds: Vec<(&str, MethodKind)> = SERVICE
        .methods
        .iter()
        .map(|method| (method.name, method.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("GetFeature", MethodKind::Unary),
            ("ListFeatures", MethodKind::ServerStreaming),
            ("RecordRoute", MethodKind::ClientStreaming),
            ("RouteChat", MethodKind::BidiStreaming),
        ]
    );

    let chat = SERVICE.method("RouteChat").unwrap();
    assert_eq!(chat.path, "/routeguide.RouteGuide/RouteChat");
    assert!(SERVICE.method("Missing").is_none());
}
