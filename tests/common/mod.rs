#![allow(dead_code)]

use futures::future::BoxFuture;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Notify;
use tunnelrpc::{
    Metadata, StatusError, StreamObserver,
    frame::{Frame, FrameBody, FrameCodec, FrameKind},
    transport::{TransportError, TransportObserver, TransportWriter},
};

/// Spawns onto the test's tokio runtime.
pub fn spawner() -> impl Fn(BoxFuture<'static, ()>) + Send + Sync + 'static {
    |future: BoxFuture<'static, ()>| {
        tokio::spawn(future);
    }
}

/// Lets spawned stream drivers and attach tasks run to their next
/// suspension point.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// In-memory transport that records every frame the connection writes and
/// lets the test play the peer.
pub struct MockTransport {
    observer: Arc<dyn TransportObserver>,
    sent: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn ready(&self) {
        self.observer.on_ready();
    }

    pub fn deliver(&self, stream_id: u32, body: FrameBody) {
        let bytes = FrameCodec::encode(&Frame::new(stream_id, body));
        self.observer.on_message(&bytes);
    }

    pub fn deliver_raw(&self, bytes: &[u8]) {
        self.observer.on_message(bytes);
    }

    pub fn fail(&self, reason: &str) {
        self.closed.store(true, Ordering::SeqCst);
        self.observer.on_close(TransportError::new(reason));
    }

    /// Every frame written so far, in order.
    pub fn frames(&self) -> Vec<Frame> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| FrameCodec::decode(bytes).expect("connection wrote a malformed frame"))
            .collect()
    }

    pub fn frames_for(&self, stream_id: u32) -> Vec<FrameBody> {
        self.frames()
            .into_iter()
            .filter(|frame| frame.stream_id == stream_id)
            .map(|frame| frame.body)
            .collect()
    }

    pub fn count_kind(&self, stream_id: u32, kind: FrameKind) -> usize {
        self.frames_for(stream_id)
            .iter()
            .filter(|body| body.kind() == kind)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl TransportWriter for MockTransport {
    fn send(&self, bytes: Vec<u8>) {
        self.sent.lock().unwrap().push(bytes);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector handing out a fresh [`MockTransport`] per connect attempt.
#[derive(Clone, Default)]
pub struct MockConnector {
    transports: Arc<Mutex<Vec<Arc<MockTransport>>>>,
}

impl MockConnector {
    pub fn transports(&self) -> Vec<Arc<MockTransport>> {
        self.transports.lock().unwrap().clone()
    }

    pub fn transport(&self, index: usize) -> Arc<MockTransport> {
        self.transports()[index].clone()
    }

    pub fn connect_count(&self) -> usize {
        self.transports.lock().unwrap().len()
    }

    /// A connector closure suitable for `Channel::new` and `Connection::open`.
    pub fn connector(
        &self,
    ) -> impl Fn(Arc<dyn TransportObserver>) -> Arc<dyn TransportWriter> + Send + Sync + 'static
    {
        let transports = Arc::clone(&self.transports);
        move |observer: Arc<dyn TransportObserver>| {
            let transport = Arc::new(MockTransport {
                observer,
                sent: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            });
            transports.lock().unwrap().push(Arc::clone(&transport));
            transport as Arc<dyn TransportWriter>
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Header(Metadata),
    Message(Vec<u8>),
    End(Result<Metadata, StatusError>),
}

/// Observer recording every callback in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
    fail_messages_with: Mutex<Option<StatusError>>,
    ended: Notify,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every following `on_message` fail with `err`.
    pub fn failing_with(err: StatusError) -> Arc<Self> {
        let observer = Self::default();
        *observer.fail_messages_with.lock().unwrap() = Some(err);
        Arc::new(observer)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn end_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::End(_)))
            .count()
    }

    pub fn outcome(&self) -> Option<Result<Metadata, StatusError>> {
        self.events().into_iter().find_map(|event| match event {
            Event::End(outcome) => Some(outcome),
            _ => None,
        })
    }

    /// Waits (bounded) for the terminal event.
    pub async fn ended(&self) -> Result<Metadata, StatusError> {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                if let Some(outcome) = self.outcome() {
                    return outcome;
                }
                self.ended.notified().await;
            }
        })
        .await
        .expect("stream never ended")
    }
}

#[async_trait::async_trait]
impl StreamObserver for RecordingObserver {
    fn on_header(&self, header: Metadata) {
        self.events.lock().unwrap().push(Event::Header(header));
    }

    async fn on_message(&self, message: Vec<u8>) -> Result<(), StatusError> {
        self.events.lock().unwrap().push(Event::Message(message));
        match self.fail_messages_with.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn on_end(&self, result: Result<Metadata, StatusError>) {
        self.events.lock().unwrap().push(Event::End(result));
        self.ended.notify_one();
    }
}
