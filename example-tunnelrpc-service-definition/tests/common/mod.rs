#![allow(dead_code)]

use example_tunnelrpc_service_definition::route_guide::{
    Feature, GET_FEATURE, LIST_FEATURES, Point, RECORD_ROUTE, ROUTE_CHAT, Rectangle, RouteNote,
    RouteSummary,
};
use futures::future::BoxFuture;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::mpsc;
use tunnelrpc::{
    Channel, Code, Metadata, Status,
    frame::{Frame, FrameBody, FrameCodec},
    transport::{TransportError, TransportObserver, TransportWriter},
};
use tunnelrpc_service::RpcMessage;

/// A point the server refuses to look up.
pub const FORBIDDEN: Point = Point {
    latitude: 1,
    longitude: 1,
};

pub fn features() -> Vec<Feature> {
    vec![
        Feature {
            name: "Patriots Path, Mendham, NJ 07945, USA".into(),
            location: Point::from_degrees(40.7838, -74.6143),
        },
        Feature {
            name: "101 New Jersey 10, Whippany, NJ 07981, USA".into(),
            location: Point::from_degrees(40.8123, -74.3999),
        },
        Feature {
            name: "Null Island".into(),
            location: Point::from_degrees(0.0, 0.0),
        },
    ]
}

enum Command {
    Frame(Vec<u8>),
    Close,
    Disconnect,
}

struct LoopbackWriter {
    commands: mpsc::UnboundedSender<Command>,
}

impl TransportWriter for LoopbackWriter {
    fn send(&self, bytes: Vec<u8>) {
        let _ = self.commands.send(Command::Frame(bytes));
    }

    fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// In-process RouteGuide server speaking the tunnel protocol.
#[derive(Default)]
pub struct LoopbackServer {
    connections: Mutex<Vec<mpsc::UnboundedSender<Command>>>,
    connect_count: AtomicUsize,
}

impl LoopbackServer {
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Drops every live connection from the server side.
    pub fn disconnect_all(&self) {
        for connection in self.connections.lock().unwrap().drain(..) {
            let _ = connection.send(Command::Disconnect);
        }
    }

    fn accept(self: &Arc<Self>, observer: Arc<dyn TransportObserver>) -> Arc<dyn TransportWriter> {
        let (commands, mut incoming) = mpsc::unbounded_channel();
        self.connections.lock().unwrap().push(commands.clone());
        self.connect_count.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            observer.on_ready();
            let mut calls: HashMap<u32, ServerCall> = HashMap::new();

            while let Some(command) = incoming.recv().await {
                match command {
                    Command::Frame(bytes) => {
                        let frame = FrameCodec::decode(&bytes).expect("client sent malformed frame");
                        for reply in handle_frame(&mut calls, frame) {
                            observer.on_message(&FrameCodec::encode(&reply));
                        }
                    }
                    Command::Close => {
                        observer.on_close(TransportError::new("closed by client"));
                        break;
                    }
                    Command::Disconnect => {
                        observer.on_close(TransportError::new("server went away"));
                        break;
                    }
                }
            }
        });

        Arc::new(LoopbackWriter { commands })
    }
}

pub fn spawner() -> impl Fn(BoxFuture<'static, ()>) + Send + Sync + 'static {
    |future: BoxFuture<'static, ()>| {
        tokio::spawn(future);
    }
}

/// A channel whose connections all land on a fresh [`LoopbackServer`].
pub fn loopback_channel() -> (Channel, Arc<LoopbackServer>) {
    let server = Arc::new(LoopbackServer::default());
    let channel = Channel::new(
        {
            let server = Arc::clone(&server);
            move |observer: Arc<dyn TransportObserver>| server.accept(observer)
        },
        spawner(),
    );
    (channel, server)
}

struct ServerCall {
    method: String,
    points: Vec<Point>,
}

fn metadata(key: &str, value: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.append(key, value);
    metadata
}

fn payload<M: RpcMessage>(stream_id: u32, message: &M) -> Frame {
    Frame::new(stream_id, FrameBody::Payload(message.encode().unwrap()))
}

fn finish(stream_id: u32, status: Status, replies: &mut Vec<Frame>) {
    replies.push(Frame::new(stream_id, FrameBody::Status(status)));
    replies.push(Frame::new(
        stream_id,
        FrameBody::Metadata(metadata("x-served-by", "loopback")),
    ));
    replies.push(Frame::new(stream_id, FrameBody::End));
}

fn handle_frame(calls: &mut HashMap<u32, ServerCall>, frame: Frame) -> Vec<Frame> {
    let id = frame.stream_id;
    let mut replies = Vec::new();

    match frame.body {
        FrameBody::Call { method } => {
            replies.push(Frame::new(
                id,
                FrameBody::Metadata(metadata("x-method", &method)),
            ));
            calls.insert(
                id,
                ServerCall {
                    method,
                    points: Vec::new(),
                },
            );
        }
        FrameBody::Payload(bytes) => {
            // Return the credit right away
            replies.push(Frame::new(
                id,
                FrameBody::Ready {
                    count: bytes.len() as u32,
                },
            ));

            let Some(call) = calls.get_mut(&id) else {
                return replies;
            };

            match call.method.as_str() {
                path if path == GET_FEATURE.path => {
                    let point = Point::decode(&bytes).unwrap();
                    if point == FORBIDDEN {
                        finish(
                            id,
                            Status::new(Code::PermissionDenied, "point is off limits"),
                            &mut replies,
                        );
                    } else {
                        let feature = features()
                            .into_iter()
                            .find(|feature| feature.location == point)
                            .unwrap_or(Feature {
                                name: String::new(),
                                location: point,
                            });
                        replies.push(payload(id, &feature));
                        finish(id, Status::ok(), &mut replies);
                    }
                }
                path if path == LIST_FEATURES.path => {
                    let rectangle = Rectangle::decode(&bytes).unwrap();
                    for feature in features() {
                        if rectangle.contains(&feature.location) {
                            replies.push(payload(id, &feature));
                        }
                    }
                    finish(id, Status::ok(), &mut replies);
                }
                path if path == RECORD_ROUTE.path => {
                    call.points.push(Point::decode(&bytes).unwrap());
                }
                path if path == ROUTE_CHAT.path => {
                    let note = RouteNote::decode(&bytes).unwrap();
                    replies.push(payload(id, &note));
                }
                _ => finish(
                    id,
                    Status::new(Code::Unimplemented, "unknown method"),
                    &mut replies,
                ),
            }
        }
        FrameBody::End => {
            if let Some(call) = calls.remove(&id) {
                if call.method == RECORD_ROUTE.path {
                    let known = features();
                    let summary = RouteSummary {
                        point_count: call.points.len() as i32,
                        feature_count: call
                            .points
                            .iter()
                            .filter(|point| known.iter().any(|f| f.location == **point))
                            .count() as i32,
                        distance: 0,
                        elapsed_time: 0,
                    };
                    replies.push(payload(id, &summary));
                    finish(id, Status::ok(), &mut replies);
                } else if call.method == ROUTE_CHAT.path {
                    finish(id, Status::ok(), &mut replies);
                }
            }
        }
        FrameBody::Close => {
            calls.remove(&id);
        }
        FrameBody::Metadata(_) | FrameBody::Ready { .. } | FrameBody::Status(_) => {}
    }

    replies
}
