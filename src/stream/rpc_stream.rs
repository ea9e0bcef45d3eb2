use crate::{
    flow_control::FlowControlWindow,
    frame::{Frame, FrameBody},
    metadata::Metadata,
    status::{Code, Status, StatusError},
    stream::{StreamObserver, StreamSink},
    utils::lock,
};
use futures::{StreamExt, channel::mpsc::UnboundedReceiver};
use std::sync::{Arc, Mutex, Weak};

/// Caller-side handle to one open call multiplexed over a connection.
///
/// Cloning yields another handle to the same call. The stream is `OPEN` from
/// creation (its `Call` frame has already been written) until its terminal
/// event fires, after which every operation is a no-op.
#[derive(Clone)]
pub struct Stream {
    shared: Arc<StreamShared>,
}

pub(crate) struct StreamShared {
    stream_id: u32,
    sink: Weak<dyn StreamSink>,
    window: FlowControlWindow,
    state: Mutex<StreamState>,
}

struct StreamState {
    terminal: bool,
    local_open: bool,
    header_seen: bool,
    remote_status: Option<Status>,
    trailer: Metadata,
    observer: Option<Arc<dyn StreamObserver>>,
    /// Frames handed to the driver and not yet processed.
    queued: usize,
    /// Set when the connection dropped while frames were still queued.
    lost: Option<StatusError>,
}

impl Stream {
    pub(crate) fn new(
        stream_id: u32,
        sink: Weak<dyn StreamSink>,
        observer: Arc<dyn StreamObserver>,
        initial_window_size: u32,
    ) -> Self {
        Self {
            shared: Arc::new(StreamShared {
                stream_id,
                sink,
                window: FlowControlWindow::new(initial_window_size),
                state: Mutex::new(StreamState {
                    terminal: false,
                    local_open: true,
                    header_seen: false,
                    remote_status: None,
                    trailer: Metadata::new(),
                    observer: Some(observer),
                    queued: 0,
                    lost: None,
                }),
            }),
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.shared.stream_id
    }

    /// Sends one message once the peer has granted enough credit for it.
    ///
    /// Resolves with an error if the stream terminates while this send is
    /// still waiting for credit. If the stream is already terminal this is a
    /// silent no-op: the observer has been told how the call ended.
    pub async fn send(&self, message: Vec<u8>) -> Result<(), StatusError> {
        {
            let state = lock(&self.shared.state);
            if state.terminal {
                return Ok(());
            }
            if !state.local_open {
                return Err(StatusError::new(
                    Code::FailedPrecondition,
                    "send after end of stream",
                ));
            }
        }

        let len = u32::try_from(message.len())
            .map_err(|_| StatusError::new(Code::ResourceExhausted, "message exceeds 4 GiB"))?;

        self.shared.window.spend(len).await?;

        // Anything may have happened while suspended on credit
        let state = lock(&self.shared.state);
        if state.terminal {
            return Ok(());
        }
        self.shared.emit(FrameBody::Payload(message));

        Ok(())
    }

    /// Declares that no further messages will be sent.
    ///
    /// Sends still waiting for credit are unaffected and will be delivered
    /// once credit arrives.
    pub fn end(&self) {
        let mut state = lock(&self.shared.state);
        if state.terminal || !state.local_open {
            return;
        }
        state.local_open = false;
        self.shared.emit(FrameBody::End);
    }

    /// Abandons the call immediately.
    ///
    /// The observer receives a `Cancelled` terminal status, any send waiting
    /// for credit fails, and a `Close` frame is sent best-effort.
    pub fn cancel(&self) {
        self.shared.terminate_locally(StatusError::cancelled());
    }

    pub fn is_terminal(&self) -> bool {
        self.shared.is_terminal()
    }

    /// Send credit currently available to this stream.
    pub fn send_credit(&self) -> u64 {
        self.shared.window.credit()
    }

    pub(crate) fn shared(&self) -> &Arc<StreamShared> {
        &self.shared
    }
}

impl StreamShared {
    pub(crate) fn is_terminal(&self) -> bool {
        lock(&self.state).terminal
    }

    fn emit(&self, body: FrameBody) {
        if let Some(sink) = self.sink.upgrade() {
            sink.send_frame(Frame::new(self.stream_id, body));
        }
    }

    /// Applies peer credit. Handled at dispatch time rather than in order
    /// with the inbox, since it produces no observer-visible event.
    pub(crate) fn grant(&self, count: u32) {
        // A poisoned window means the stream is finished; stale credit is moot
        let _ = self.window.grant(count);
    }

    /// Counts a frame about to be pushed into the driver's inbox. Called by
    /// the connection while it still holds its routing lock.
    pub(crate) fn frame_queued(&self) {
        lock(&self.state).queued += 1;
    }

    fn frame_done(&self) {
        let lost = {
            let mut state = lock(&self.state);
            state.queued = state.queued.saturating_sub(1);
            if state.queued == 0 {
                state.lost.take()
            } else {
                None
            }
        };

        if let Some(reason) = lost {
            self.abort(&reason);
        }
    }

    /// Connection-level teardown.
    ///
    /// A stream with nothing queued is finalized right away. Otherwise the
    /// driver first works through the frames that arrived before the
    /// transport closed, so a `Status` and `End` already received still
    /// decide the outcome.
    pub(crate) fn connection_lost(&self, reason: StatusError) {
        {
            let mut state = lock(&self.state);
            if state.terminal {
                return;
            }
            if state.queued > 0 {
                state.lost = Some(reason);
                return;
            }
        }
        self.abort(&reason);
    }

    /// Processes one inbound frame. Frames for one stream are fed through
    /// here strictly one at a time, in arrival order.
    async fn handle_frame(&self, body: FrameBody) {
        match body {
            FrameBody::Metadata(metadata) => self.on_metadata(metadata),
            FrameBody::Ready { count } => self.grant(count),
            FrameBody::Payload(bytes) => self.on_payload(bytes).await,
            FrameBody::Status(status) => {
                let mut state = lock(&self.state);
                if !state.terminal {
                    state.remote_status = Some(status);
                }
            }
            FrameBody::End | FrameBody::Close => self.finish_from_peer(),
            FrameBody::Call { .. } => {
                // The connection rejects these before they reach a stream
                tracing::warn!(stream_id = self.stream_id, "ignoring Call frame on open stream");
            }
        }
    }

    fn on_metadata(&self, metadata: Metadata) {
        let header_observer = {
            let mut state = lock(&self.state);
            if state.terminal {
                return;
            }

            if !state.header_seen && state.remote_status.is_none() {
                state.header_seen = true;
                state.observer.clone()
            } else {
                state.trailer = metadata;
                return;
            }
        };

        if let Some(observer) = header_observer {
            observer.on_header(metadata);
        }
    }

    async fn on_payload(&self, bytes: Vec<u8>) {
        let observer = {
            let state = lock(&self.state);
            if state.terminal {
                return;
            }
            state.observer.clone()
        };

        let Some(observer) = observer else {
            return;
        };

        let count = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        let result = observer.on_message(bytes).await;

        if self.is_terminal() {
            return;
        }

        // Return exactly the credit this message consumed
        self.emit(FrameBody::Ready { count });

        if let Err(err) = result {
            tracing::debug!(stream_id = self.stream_id, error = %err, "message handler failed; cancelling");
            self.terminate_locally(err);
        }
    }

    /// `End` or `Close` from the peer: report the recorded status, or a
    /// synthesized aborted status if the peer never sent one.
    fn finish_from_peer(&self) {
        self.finalize(false, |state| take_outcome(state, StatusError::aborted()));
    }

    /// Keeps a real status if one already arrived.
    fn abort(&self, reason: &StatusError) {
        self.finalize(false, |state| take_outcome(state, reason.clone()));
    }

    pub(crate) fn terminate_locally(&self, error: StatusError) {
        if self.finalize(true, |_| Err(error)) {
            self.emit(FrameBody::Close);
        }
    }

    /// Moves the stream to TERMINAL and notifies the observer, at most once.
    ///
    /// `closing_locally` tells the connection to keep tolerating frames the
    /// peer sent before it sees our `Close`.
    fn finalize<F>(&self, closing_locally: bool, decide: F) -> bool
    where
        F: FnOnce(&mut StreamState) -> Result<Metadata, StatusError>,
    {
        let (observer, outcome) = {
            let mut state = lock(&self.state);
            if state.terminal {
                return false;
            }
            state.terminal = true;
            let outcome = decide(&mut state);
            (state.observer.take(), outcome)
        };

        let poison = match &outcome {
            Ok(_) => StatusError::aborted(),
            Err(err) => err.clone(),
        };
        self.window.poison(poison);

        if let Some(sink) = self.sink.upgrade() {
            sink.release_stream(self.stream_id, closing_locally);
        }

        match &outcome {
            Ok(_) => tracing::debug!(stream_id = self.stream_id, "stream finished"),
            Err(err) => tracing::debug!(stream_id = self.stream_id, error = %err, "stream failed"),
        }

        if let Some(observer) = observer {
            observer.on_end(outcome);
        }

        true
    }
}

fn take_outcome(state: &mut StreamState, fallback: StatusError) -> Result<Metadata, StatusError> {
    let trailer = std::mem::take(&mut state.trailer);

    match state.remote_status.take() {
        Some(status) if status.is_ok() => Ok(trailer),
        Some(status) => Err(StatusError::from_status(status, trailer)),
        None => Err(StatusError { trailer, ..fallback }),
    }
}

/// Drains one stream's inbox in order until the stream finalizes or the
/// connection drops the inbox. Frames already queued when the inbox is
/// dropped are still processed.
pub(crate) async fn drive_stream(shared: Arc<StreamShared>, mut inbox: UnboundedReceiver<FrameBody>) {
    while let Some(body) = inbox.next().await {
        shared.handle_frame(body).await;
        shared.frame_done();

        if shared.is_terminal() {
            break;
        }
    }
}
