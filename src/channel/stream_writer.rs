use crate::{
    connection::Connection,
    pool::ConnectionPool,
    status::StatusError,
    stream::{CallOptions, Stream, StreamObserver},
    utils::lock,
};
use futures::channel::oneshot;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

/// Writer half of a call started through a [`Channel`](crate::channel::Channel).
///
/// Usable immediately. Until the underlying stream is open, `send` and `end`
/// are queued in call order and replayed onto the stream once it attaches;
/// after that they pass straight through. Clones share the same call.
#[derive(Clone)]
pub struct StreamWriter {
    state: Arc<Mutex<WriterState>>,
}

enum WriterState {
    /// Waiting for a connection.
    Pending {
        queue: VecDeque<QueuedCall>,
        observer: Arc<dyn StreamObserver>,
    },
    /// Stream open; earlier calls are still being replayed onto it.
    Replaying {
        queue: VecDeque<QueuedCall>,
        stream: Stream,
    },
    Attached(Stream),
    /// Cancelled or failed before a stream was ever opened.
    Closed,
}

enum QueuedCall {
    Send {
        message: Vec<u8>,
        done: oneshot::Sender<Result<(), StatusError>>,
    },
    End,
}

enum SendRoute {
    Queued(oneshot::Receiver<Result<(), StatusError>>),
    Direct(Stream, Vec<u8>),
}

impl StreamWriter {
    pub(crate) fn pending(observer: Arc<dyn StreamObserver>) -> Self {
        Self {
            state: Arc::new(Mutex::new(WriterState::Pending {
                queue: VecDeque::new(),
                observer,
            })),
        }
    }

    /// Sends one message, waiting for flow-control credit if needed.
    ///
    /// Before attachment the message is queued and this resolves once it has
    /// actually been sent, or fails if the call ends first.
    pub async fn send(&self, message: Vec<u8>) -> Result<(), StatusError> {
        let route = {
            let mut state = lock(&self.state);
            match &mut *state {
                WriterState::Pending { queue, .. } | WriterState::Replaying { queue, .. } => {
                    let (done, result) = oneshot::channel();
                    queue.push_back(QueuedCall::Send { message, done });
                    SendRoute::Queued(result)
                }
                WriterState::Attached(stream) => SendRoute::Direct(stream.clone(), message),
                WriterState::Closed => return Ok(()),
            }
        };

        match route {
            SendRoute::Queued(result) => result.await.unwrap_or_else(|_| Err(StatusError::cancelled())),
            SendRoute::Direct(stream, message) => stream.send(message).await,
        }
    }

    /// Half-closes the call once everything queued before it has been sent.
    pub fn end(&self) {
        let mut state = lock(&self.state);
        match &mut *state {
            WriterState::Pending { queue, .. } | WriterState::Replaying { queue, .. } => {
                queue.push_back(QueuedCall::End)
            }
            WriterState::Attached(stream) => stream.end(),
            WriterState::Closed => {}
        }
    }

    /// Cancels the call right away, whether or not it has attached yet.
    ///
    /// Queued sends fail with `Cancelled` and the observer receives its
    /// terminal event without waiting for a connection.
    pub fn cancel(&self) {
        let cancelled = StatusError::cancelled();

        let (queue, observer, stream) = {
            let mut state = lock(&self.state);
            match std::mem::replace(&mut *state, WriterState::Closed) {
                WriterState::Pending { queue, observer } => (queue, Some(observer), None),
                WriterState::Replaying { queue, stream } => {
                    *state = WriterState::Attached(stream.clone());
                    (queue, None, Some(stream))
                }
                WriterState::Attached(stream) => {
                    *state = WriterState::Attached(stream.clone());
                    (VecDeque::new(), None, Some(stream))
                }
                WriterState::Closed => return,
            }
        };

        // The stream notifies its own observer
        if let Some(stream) = stream {
            stream.cancel();
        }

        fail_queue(queue, &cancelled);

        if let Some(observer) = observer {
            observer.on_end(Err(cancelled));
        }
    }

    /// The id of the underlying stream, once attached.
    pub fn stream_id(&self) -> Option<u32> {
        match &*lock(&self.state) {
            WriterState::Replaying { stream, .. } | WriterState::Attached(stream) => {
                Some(stream.stream_id())
            }
            _ => None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.stream_id().is_some()
    }

    /// Acquires a connection, opens the stream and replays the queue.
    pub(crate) async fn attach(self, pool: ConnectionPool<Connection>, options: CallOptions) {
        let connection = pool.acquire().await.map_err(StatusError::from);

        let failure = {
            let mut state = lock(&self.state);
            // Only `Pending` or `Closed` are possible before attachment
            let WriterState::Pending { queue, observer } =
                std::mem::replace(&mut *state, WriterState::Closed)
            else {
                return;
            };

            let opened = connection.and_then(|connection| {
                connection
                    .create_stream(Arc::clone(&observer), options)
                    .map_err(StatusError::from)
            });

            match opened {
                Ok(stream) => {
                    *state = WriterState::Replaying { queue, stream };
                    None
                }
                Err(err) => Some((queue, observer, err)),
            }
        };

        match failure {
            None => self.replay().await,
            Some((queue, observer, err)) => {
                tracing::debug!(error = %err, "stream attach failed");
                fail_queue(queue, &err);
                observer.on_end(Err(err));
            }
        }
    }

    async fn replay(&self) {
        loop {
            let (stream, call) = {
                let mut state = lock(&self.state);
                let WriterState::Replaying { queue, stream } = &mut *state else {
                    return;
                };

                match queue.pop_front() {
                    Some(call) => (stream.clone(), call),
                    None => {
                        let stream = stream.clone();
                        *state = WriterState::Attached(stream);
                        return;
                    }
                }
            };

            match call {
                QueuedCall::Send { message, done } => {
                    let result = stream.send(message).await;
                    let _ = done.send(result);
                }
                QueuedCall::End => stream.end(),
            }
        }
    }
}

fn fail_queue(queue: VecDeque<QueuedCall>, err: &StatusError) {
    for call in queue {
        if let QueuedCall::Send { done, .. } = call {
            let _ = done.send(Err(err.clone()));
        }
    }
}
