use crate::{
    connection::{ConnectionError, ConnectionListener},
    constants::{CLOSED_STREAM_RETENTION, FIRST_STREAM_ID},
    frame::{Frame, FrameBody, FrameCodec},
    pool::{PoolLifecycle, PooledConnection},
    spawner::Spawner,
    status::StatusError,
    stream::{CallOptions, Stream, StreamObserver, StreamShared, StreamSink, drive_stream},
    transport::{TransportConnector, TransportError, TransportObserver, TransportWriter},
    utils::lock,
};
use futures::{FutureExt, channel::mpsc};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// One physical transport plus the state needed to demultiplex it into
/// streams.
///
/// Inbound frames are routed by stream id. A frame that cannot be routed
/// (malformed, unknown id, or a `Call` from the peer) tears the whole
/// connection down: every open stream is finalized with an aborted status and
/// the transport is closed. The one exception is a stream this side ended with
/// `Close`: frames the peer sent before seeing it are dropped.
pub struct Connection {
    me: Weak<Connection>,
    connection_id: u64,
    spawner: Arc<dyn Spawner>,
    listener: Arc<dyn ConnectionListener>,
    inner: Mutex<ConnectionInner>,
    writer: Mutex<WriterSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Active,
    Closed,
}

struct ConnectionInner {
    phase: Phase,
    next_stream_id: u32,
    streams: BTreeMap<u32, StreamEntry>,
    /// Streams ended by a local `Close` that the peer has not closed yet.
    closed_locally: BTreeSet<u32>,
}

struct StreamEntry {
    shared: Arc<StreamShared>,
    inbox: mpsc::UnboundedSender<FrameBody>,
}

/// Where an inbound frame went.
enum Route {
    Grant(Arc<StreamShared>, u32),
    Queued,
    Dropped,
    Unknown,
}

enum WriterSlot {
    /// The connector has not handed back a writer yet; frames wait here.
    Detached(Vec<Vec<u8>>),
    Attached(Arc<dyn TransportWriter>),
    Closed,
}

/// Adapter the transport calls back into. Holds the connection weakly so an
/// abandoned transport cannot keep it alive.
struct ConnectionEvents {
    connection: Weak<Connection>,
}

impl Connection {
    /// Starts a new transport through `connector` and returns the connection
    /// in its pending phase.
    pub fn open(
        connector: &dyn TransportConnector,
        spawner: Arc<dyn Spawner>,
        listener: Arc<dyn ConnectionListener>,
    ) -> Arc<Self> {
        let connection = Arc::new_cyclic(|me| Connection {
            me: me.clone(),
            connection_id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            spawner,
            listener,
            inner: Mutex::new(ConnectionInner {
                phase: Phase::Pending,
                next_stream_id: FIRST_STREAM_ID,
                streams: BTreeMap::new(),
                closed_locally: BTreeSet::new(),
            }),
            writer: Mutex::new(WriterSlot::Detached(Vec::new())),
        });

        tracing::debug!(connection_id = connection.connection_id, "opening connection");

        let events = Arc::new(ConnectionEvents {
            connection: Arc::downgrade(&connection),
        });
        let writer = connector.connect(events);
        connection.attach_writer(writer);

        connection
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Whether the transport has signalled ready and not yet closed.
    pub fn is_active(&self) -> bool {
        lock(&self.inner).phase == Phase::Active
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).phase == Phase::Closed
    }

    /// Number of streams that have not finalized yet.
    pub fn open_streams(&self) -> usize {
        lock(&self.inner).streams.len()
    }

    /// Opens a new call on this connection.
    ///
    /// Sends `Call`, then the request header if any, then the initial
    /// `Ready` grant. Frames written before the transport is ready are
    /// buffered by the transport (or by this connection until the transport
    /// writer is attached).
    pub fn create_stream(
        &self,
        observer: Arc<dyn StreamObserver>,
        options: CallOptions,
    ) -> Result<Stream, ConnectionError> {
        let window_size = options.window_size();

        let (stream, inbox) = {
            let mut inner = lock(&self.inner);
            if inner.phase == Phase::Closed {
                return Err(ConnectionError::Closed);
            }

            let stream_id = inner.next_stream_id;
            inner.next_stream_id = stream_id
                .checked_add(1)
                .ok_or(ConnectionError::StreamIdsExhausted)?;

            let sink: Weak<dyn StreamSink> = self.me.clone();
            let stream = Stream::new(stream_id, sink, observer, window_size);

            let (sender, inbox) = mpsc::unbounded();
            inner.streams.insert(
                stream_id,
                StreamEntry {
                    shared: Arc::clone(stream.shared()),
                    inbox: sender,
                },
            );

            (stream, inbox)
        };

        let stream_id = stream.stream_id();
        tracing::debug!(
            connection_id = self.connection_id,
            stream_id,
            method = %options.method,
            "opening stream"
        );

        self.spawner
            .spawn(drive_stream(Arc::clone(stream.shared()), inbox).boxed());

        self.send_frame(Frame::new(
            stream_id,
            FrameBody::Call {
                method: options.method,
            },
        ));
        if let Some(metadata) = options.metadata {
            self.send_frame(Frame::new(stream_id, FrameBody::Metadata(metadata)));
        }
        self.send_frame(Frame::new(
            stream_id,
            FrameBody::Ready { count: window_size },
        ));

        Ok(stream)
    }

    /// Closes the transport and aborts every open stream.
    pub fn close(&self) {
        self.close_writer();
        self.teardown(StatusError::connection_lost(ConnectionError::Closed));
    }

    fn attach_writer(&self, writer: Arc<dyn TransportWriter>) {
        let mut slot = lock(&self.writer);
        match std::mem::replace(&mut *slot, WriterSlot::Closed) {
            WriterSlot::Detached(queued) => {
                for bytes in queued {
                    writer.send(bytes);
                }
                *slot = WriterSlot::Attached(writer);
            }
            // Torn down while the connector was still running
            WriterSlot::Closed => writer.close(),
            WriterSlot::Attached(previous) => *slot = WriterSlot::Attached(previous),
        }
    }

    fn close_writer(&self) {
        let mut slot = lock(&self.writer);
        if let WriterSlot::Attached(writer) = std::mem::replace(&mut *slot, WriterSlot::Closed) {
            writer.close();
        }
    }

    fn handle_ready(&self) {
        {
            let mut inner = lock(&self.inner);
            if inner.phase != Phase::Pending {
                return;
            }
            inner.phase = Phase::Active;
        }

        tracing::debug!(connection_id = self.connection_id, "connection active");

        if let Some(me) = self.me.upgrade() {
            self.listener.connection_active(&me);
        }
    }

    fn handle_message(&self, bytes: &[u8]) {
        let frame = match FrameCodec::decode(bytes) {
            Ok(frame) => frame,
            Err(err) => {
                self.fail(err.into());
                return;
            }
        };

        tracing::trace!(
            connection_id = self.connection_id,
            stream_id = frame.stream_id,
            kind = ?frame.kind(),
            "inbound frame"
        );

        let Frame { stream_id, body } = frame;

        if let FrameBody::Call { .. } = body {
            self.fail(ConnectionError::UnexpectedCall(stream_id));
            return;
        }

        let route = {
            let mut inner = lock(&self.inner);
            if inner.phase == Phase::Closed {
                return;
            }

            if let Some(entry) = inner.streams.get(&stream_id) {
                match body {
                    FrameBody::Ready { count } => Route::Grant(Arc::clone(&entry.shared), count),
                    body => {
                        entry.shared.frame_queued();
                        // The driver is gone only once the stream finalized
                        if entry.inbox.unbounded_send(body).is_err() {
                            tracing::trace!(stream_id, "dropping frame for finalizing stream");
                        }
                        Route::Queued
                    }
                }
            } else if inner.closed_locally.contains(&stream_id) {
                // Nothing more will come once the peer ends its side
                if matches!(body, FrameBody::End | FrameBody::Close) {
                    inner.closed_locally.remove(&stream_id);
                }
                tracing::trace!(stream_id, kind = ?body.kind(), "dropping frame for locally closed stream");
                Route::Dropped
            } else {
                Route::Unknown
            }
        };

        match route {
            Route::Grant(shared, count) => shared.grant(count),
            Route::Unknown => self.fail(ConnectionError::UnknownStream(stream_id)),
            Route::Queued | Route::Dropped => {}
        }
    }

    fn fail(&self, err: ConnectionError) {
        tracing::warn!(
            connection_id = self.connection_id,
            error = %err,
            "protocol violation; closing connection"
        );
        self.close_writer();
        self.teardown(StatusError::connection_lost(err));
    }

    fn handle_close(&self, err: TransportError) {
        if self.is_closed() {
            return;
        }
        tracing::warn!(connection_id = self.connection_id, error = %err, "transport closed");
        self.close_writer();
        self.teardown(StatusError::connection_lost(ConnectionError::Transport(err)));
    }

    /// Marks the connection closed, deregisters it, then finalizes every
    /// stream that was still open. Streams with nothing queued finalize within
    /// the current reaction; the rest once their driver has processed the
    /// frames that arrived before the close.
    fn teardown(&self, reason: StatusError) {
        let streams = {
            let mut inner = lock(&self.inner);
            if inner.phase == Phase::Closed {
                return;
            }
            inner.phase = Phase::Closed;
            inner.closed_locally.clear();
            std::mem::take(&mut inner.streams)
        };

        tracing::debug!(
            connection_id = self.connection_id,
            open_streams = streams.len(),
            "connection closed"
        );

        if let Some(me) = self.me.upgrade() {
            self.listener.connection_closed(&me);
        }

        // Dropping each entry closes its inbox, ending the driver once drained
        for entry in streams.into_values() {
            entry.shared.connection_lost(reason.clone());
        }
    }
}

impl StreamSink for Connection {
    fn send_frame(&self, frame: Frame) {
        let bytes = FrameCodec::encode(&frame);
        let mut slot = lock(&self.writer);
        match &mut *slot {
            WriterSlot::Detached(queued) => queued.push(bytes),
            WriterSlot::Attached(writer) => writer.send(bytes),
            WriterSlot::Closed => {
                tracing::trace!(stream_id = frame.stream_id, kind = ?frame.kind(), "dropping frame on closed connection");
            }
        }
    }

    fn release_stream(&self, stream_id: u32, closed_locally: bool) {
        let mut inner = lock(&self.inner);
        if inner.streams.remove(&stream_id).is_none() || !closed_locally {
            return;
        }

        inner.closed_locally.insert(stream_id);
        if inner.closed_locally.len() > CLOSED_STREAM_RETENTION {
            // Forget the oldest; a frame for it will now be fatal
            inner.closed_locally.pop_first();
        }
    }
}

impl TransportObserver for ConnectionEvents {
    fn on_ready(&self) {
        if let Some(connection) = self.connection.upgrade() {
            connection.handle_ready();
        }
    }

    fn on_message(&self, bytes: &[u8]) {
        if let Some(connection) = self.connection.upgrade() {
            connection.handle_message(bytes);
        }
    }

    fn on_close(&self, error: TransportError) {
        if let Some(connection) = self.connection.upgrade() {
            connection.handle_close(error);
        }
    }
}

impl PooledConnection for Connection {
    fn is_closed(&self) -> bool {
        Connection::is_closed(self)
    }

    fn close(&self) {
        Connection::close(self)
    }
}

impl ConnectionListener for PoolLifecycle<Connection> {
    fn connection_active(&self, connection: &Arc<Connection>) {
        PoolLifecycle::connection_active(self, connection)
    }

    fn connection_closed(&self, connection: &Arc<Connection>) {
        PoolLifecycle::connection_closed(self, connection)
    }
}
