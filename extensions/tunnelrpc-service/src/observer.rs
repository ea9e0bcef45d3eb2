use crate::RpcMessage;
use std::{marker::PhantomData, sync::Arc};
use tunnelrpc::{Metadata, StatusError, StreamObserver};

/// Typed counterpart of [`StreamObserver`]: receives decoded messages.
#[async_trait::async_trait]
pub trait MessageObserver<O: Send + 'static>: Send + Sync + 'static {
    fn on_header(&self, _header: Metadata) {}

    async fn on_message(&self, message: O) -> Result<(), StatusError>;

    fn on_end(&self, result: Result<Metadata, StatusError>);
}

/// Adapts a [`MessageObserver`] to the byte-level [`StreamObserver`].
///
/// A payload that fails to decode fails the call with `Internal`.
pub struct DecodingObserver<O: Send + 'static> {
    inner: Arc<dyn MessageObserver<O>>,
    _output: PhantomData<fn() -> O>,
}

impl<O: RpcMessage> DecodingObserver<O> {
    pub fn new(inner: Arc<dyn MessageObserver<O>>) -> Self {
        Self {
            inner,
            _output: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<O: RpcMessage> StreamObserver for DecodingObserver<O> {
    fn on_header(&self, header: Metadata) {
        self.inner.on_header(header);
    }

    async fn on_message(&self, message: Vec<u8>) -> Result<(), StatusError> {
        let decoded = O::decode(&message)
            .map_err(|err| StatusError::internal(format!("failed to decode message: {err}")))?;
        self.inner.on_message(decoded).await
    }

    fn on_end(&self, result: Result<Metadata, StatusError>) {
        self.inner.on_end(result);
    }
}
