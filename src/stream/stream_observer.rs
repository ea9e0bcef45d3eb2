use crate::{metadata::Metadata, status::StatusError};

/// Receives the events of one call.
///
/// `on_end` is invoked exactly once per stream, and neither `on_header` nor
/// `on_message` is invoked after it.
#[async_trait::async_trait]
pub trait StreamObserver: Send + Sync + 'static {
    /// The response header (the first metadata the peer sends).
    fn on_header(&self, _header: Metadata) {}

    /// One inbound message.
    ///
    /// Credit for the message is returned to the peer only after this
    /// completes, so a slow handler applies backpressure to the sender.
    /// Returning an error cancels the call with that error as its status.
    async fn on_message(&self, message: Vec<u8>) -> Result<(), StatusError>;

    /// The terminal event: the trailer on success, otherwise the failure.
    fn on_end(&self, result: Result<Metadata, StatusError>);
}
