use crate::{
    DecodingObserver, MessageObserver, RpcMessage, ServiceMethod,
    constants::DEFAULT_RESPONSE_STREAM_BUFFER_SIZE,
};
use futures::{
    SinkExt, Stream,
    channel::{mpsc, oneshot},
};
use std::{
    marker::PhantomData,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};
use tunnelrpc::{Channel, Metadata, StatusError, StreamWriter, utils::lock};

fn encode_message<I: RpcMessage>(message: &I) -> Result<Vec<u8>, StatusError> {
    message
        .encode()
        .map_err(|err| StatusError::internal(format!("failed to encode message: {err}")))
}

/// Per-call extras on top of what the [`ServiceMethod`] already fixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraCallOptions {
    pub metadata: Option<Metadata>,
    pub initial_window_size: Option<u32>,
}

impl ExtraCallOptions {
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_initial_window_size(mut self, size: u32) -> Self {
        self.initial_window_size = Some(size);
        self
    }
}

/// [`StreamWriter`] that encodes request messages of type `I`.
pub struct TypedStreamWriter<I> {
    inner: StreamWriter,
    _input: PhantomData<fn(I)>,
}

impl<I> Clone for TypedStreamWriter<I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _input: PhantomData,
        }
    }
}

impl<I: RpcMessage> TypedStreamWriter<I> {
    pub fn new(inner: StreamWriter) -> Self {
        Self {
            inner,
            _input: PhantomData,
        }
    }

    pub async fn send(&self, message: &I) -> Result<(), StatusError> {
        let bytes = encode_message(message)?;
        self.inner.send(bytes).await
    }

    pub fn end(&self) {
        self.inner.end();
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn stream_id(&self) -> Option<u32> {
        self.inner.stream_id()
    }

    /// The untyped writer underneath.
    pub fn raw(&self) -> &StreamWriter {
        &self.inner
    }
}

/// Everything a single-response call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryResponse<O> {
    pub header: Option<Metadata>,
    pub message: O,
    pub trailer: Metadata,
}

/// Starts a call of any shape; the lowest-level typed entry point.
pub fn invoke<I, O>(
    channel: &Channel,
    method: &ServiceMethod<I, O>,
    observer: Arc<dyn MessageObserver<O>>,
    options: ExtraCallOptions,
) -> TypedStreamWriter<I>
where
    I: RpcMessage,
    O: RpcMessage,
{
    let writer = channel.create_stream(
        Arc::new(DecodingObserver::new(observer)),
        method.call_options(options),
    );
    TypedStreamWriter::new(writer)
}

/// Sends the single request and half-closes. A failed send needs no
/// handling here: it only happens once the call has ended, and the observer
/// reports how.
async fn send_request<I: RpcMessage>(writer: &TypedStreamWriter<I>, payload: Vec<u8>) {
    if let Err(err) = writer.raw().send(payload).await {
        tracing::debug!(error = %err, "request not sent");
    }
    writer.end();
}

/// One request, one response.
pub async fn call_unary<I, O>(
    channel: &Channel,
    method: &ServiceMethod<I, O>,
    request: &I,
    options: ExtraCallOptions,
) -> Result<UnaryResponse<O>, StatusError>
where
    I: RpcMessage,
    O: RpcMessage,
{
    let payload = encode_message(request)?;
    let (collector, response) = UnaryCollector::new();

    let writer = invoke(channel, method, collector, options);
    send_request(&writer, payload).await;

    await_response(response).await
}

/// One request, a stream of responses delivered to `observer`.
///
/// Resolves once the request has been written; the returned writer can be
/// used to cancel the call.
pub async fn call_server_streaming<I, O>(
    channel: &Channel,
    method: &ServiceMethod<I, O>,
    request: &I,
    observer: Arc<dyn MessageObserver<O>>,
    options: ExtraCallOptions,
) -> Result<TypedStreamWriter<I>, StatusError>
where
    I: RpcMessage,
    O: RpcMessage,
{
    let payload = encode_message(request)?;
    let writer = invoke(channel, method, observer, options);
    send_request(&writer, payload).await;
    Ok(writer)
}

/// One request, responses consumed as a [`futures::Stream`].
///
/// The stream yields `Err` once if the call fails, then ends. Dropping it
/// cancels the call.
pub async fn server_streaming<I, O>(
    channel: &Channel,
    method: &ServiceMethod<I, O>,
    request: &I,
    options: ExtraCallOptions,
) -> Result<ResponseStream<O>, StatusError>
where
    I: RpcMessage,
    O: RpcMessage,
{
    let payload = encode_message(request)?;
    let (sender, receiver) = mpsc::channel(DEFAULT_RESPONSE_STREAM_BUFFER_SIZE);
    let shared = Arc::new(ResponseShared::default());

    let forwarder = Arc::new(ResponseForwarder {
        sender: Mutex::new(Some(sender)),
        shared: Arc::clone(&shared),
    });

    let writer = invoke(channel, method, forwarder, options);
    send_request(&writer, payload).await;

    Ok(ResponseStream {
        receiver,
        shared,
        writer: writer.inner,
    })
}

/// A stream of requests, one response.
pub fn call_client_streaming<I, O>(
    channel: &Channel,
    method: &ServiceMethod<I, O>,
    options: ExtraCallOptions,
) -> ClientStreamingCall<I, O>
where
    I: RpcMessage,
    O: RpcMessage,
{
    let (collector, response) = UnaryCollector::new();
    let writer = invoke(channel, method, collector, options);
    ClientStreamingCall { writer, response }
}

/// An open client-streaming call.
pub struct ClientStreamingCall<I, O> {
    writer: TypedStreamWriter<I>,
    response: oneshot::Receiver<Result<UnaryResponse<O>, StatusError>>,
}

impl<I: RpcMessage, O: RpcMessage> ClientStreamingCall<I, O> {
    pub async fn send(&self, message: &I) -> Result<(), StatusError> {
        self.writer.send(message).await
    }

    pub fn cancel(&self) {
        self.writer.cancel();
    }

    pub fn writer(&self) -> &TypedStreamWriter<I> {
        &self.writer
    }

    /// Half-closes the request stream and waits for the response.
    pub async fn finish(self) -> Result<UnaryResponse<O>, StatusError> {
        self.writer.end();
        await_response(self.response).await
    }
}

async fn await_response<O>(
    response: oneshot::Receiver<Result<UnaryResponse<O>, StatusError>>,
) -> Result<UnaryResponse<O>, StatusError> {
    // The observer always completes the sender; losing it means the call
    // was dropped without a terminal event
    response.await.unwrap_or_else(|_| Err(StatusError::aborted()))
}

struct UnaryCollector<O> {
    state: Mutex<UnaryState<O>>,
}

struct UnaryState<O> {
    header: Option<Metadata>,
    message: Option<O>,
    done: Option<oneshot::Sender<Result<UnaryResponse<O>, StatusError>>>,
}

impl<O: RpcMessage> UnaryCollector<O> {
    fn new() -> (
        Arc<Self>,
        oneshot::Receiver<Result<UnaryResponse<O>, StatusError>>,
    ) {
        let (done, response) = oneshot::channel();
        let collector = Arc::new(Self {
            state: Mutex::new(UnaryState {
                header: None,
                message: None,
                done: Some(done),
            }),
        });
        (collector, response)
    }
}

#[async_trait::async_trait]
impl<O: RpcMessage> MessageObserver<O> for UnaryCollector<O> {
    fn on_header(&self, header: Metadata) {
        lock(&self.state).header = Some(header);
    }

    async fn on_message(&self, message: O) -> Result<(), StatusError> {
        let mut state = lock(&self.state);
        if state.message.is_some() {
            return Err(StatusError::internal("received more than one response message"));
        }
        state.message = Some(message);
        Ok(())
    }

    fn on_end(&self, result: Result<Metadata, StatusError>) {
        let mut state = lock(&self.state);
        let Some(done) = state.done.take() else {
            return;
        };

        let outcome = result.and_then(|trailer| match state.message.take() {
            Some(message) => Ok(UnaryResponse {
                header: state.header.take(),
                message,
                trailer,
            }),
            None => Err(StatusError::internal("call completed without a response message")),
        });

        let _ = done.send(outcome);
    }
}

#[derive(Default)]
struct ResponseShared {
    header: Mutex<Option<Metadata>>,
    trailer: Mutex<Option<Metadata>>,
}

struct ResponseForwarder<O> {
    sender: Mutex<Option<mpsc::Sender<Result<O, StatusError>>>>,
    shared: Arc<ResponseShared>,
}

#[async_trait::async_trait]
impl<O: RpcMessage> MessageObserver<O> for ResponseForwarder<O> {
    fn on_header(&self, header: Metadata) {
        *lock(&self.shared.header) = Some(header);
    }

    async fn on_message(&self, message: O) -> Result<(), StatusError> {
        let sender = lock(&self.sender).clone();
        let Some(mut sender) = sender else {
            return Ok(());
        };

        // Waiting here holds back the credit for this message
        sender
            .send(Ok(message))
            .await
            .map_err(|_| StatusError::cancelled())
    }

    fn on_end(&self, result: Result<Metadata, StatusError>) {
        let sender = lock(&self.sender).take();
        match result {
            Ok(trailer) => *lock(&self.shared.trailer) = Some(trailer),
            Err(err) => {
                if let Some(mut sender) = sender {
                    let _ = sender.try_send(Err(err));
                }
            }
        }
    }
}

/// Responses of a server-streaming call.
pub struct ResponseStream<O> {
    receiver: mpsc::Receiver<Result<O, StatusError>>,
    shared: Arc<ResponseShared>,
    writer: StreamWriter,
}

impl<O> ResponseStream<O> {
    /// The response header, once it has arrived.
    pub fn header(&self) -> Option<Metadata> {
        lock(&self.shared.header).clone()
    }

    /// The trailer of a successfully completed call.
    pub fn trailer(&self) -> Option<Metadata> {
        lock(&self.shared.trailer).clone()
    }

    pub fn cancel(&self) {
        self.writer.cancel();
    }
}

impl<O> Stream for ResponseStream<O> {
    type Item = Result<O, StatusError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl<O> Drop for ResponseStream<O> {
    fn drop(&mut self) {
        // No-op once the call has ended
        self.writer.cancel();
    }
}
