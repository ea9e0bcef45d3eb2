use crate::{
    channel::{ChannelConfig, StreamWriter},
    connection::Connection,
    pool::{ConnectionPool, PoolLifecycle},
    spawner::Spawner,
    stream::{CallOptions, StreamObserver},
    transport::TransportConnector,
};
use futures::FutureExt;
use std::sync::Arc;

/// Caller-facing entry point: opens calls over a pool of tunnel connections.
///
/// Cloning is cheap and shares the pool. When the last clone is dropped the
/// pool is shut down and its connections are closed.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    pool: ConnectionPool<Connection>,
    spawner: Arc<dyn Spawner>,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.pool.shutdown();
    }
}

impl Channel {
    pub fn new<T, S>(connector: T, spawner: S) -> Self
    where
        T: TransportConnector,
        S: Spawner,
    {
        Self::with_config(connector, spawner, ChannelConfig::default())
    }

    pub fn with_config<T, S>(connector: T, spawner: S, config: ChannelConfig) -> Self
    where
        T: TransportConnector,
        S: Spawner,
    {
        let spawner: Arc<dyn Spawner> = Arc::new(spawner);

        let pool = ConnectionPool::new(config.pool_size, Arc::clone(&spawner), {
            let spawner = Arc::clone(&spawner);
            move |lifecycle: PoolLifecycle<Connection>| {
                Connection::open(&connector, Arc::clone(&spawner), Arc::new(lifecycle))
            }
        });

        Self {
            inner: Arc::new(ChannelInner { pool, spawner }),
        }
    }

    /// Starts a call and returns its writer right away.
    ///
    /// The writer attaches to a real stream once the pool hands out an
    /// active connection; anything written before that is queued and
    /// replayed in order. If no stream can be opened, queued sends fail and
    /// `observer` receives the error as its terminal event.
    pub fn create_stream(
        &self,
        observer: Arc<dyn StreamObserver>,
        options: CallOptions,
    ) -> StreamWriter {
        let writer = StreamWriter::pending(observer);
        self.inner
            .spawner
            .spawn(writer.clone().attach(self.inner.pool.clone(), options).boxed());
        writer
    }

    /// The pool backing this channel.
    pub fn pool(&self) -> &ConnectionPool<Connection> {
        &self.inner.pool
    }

    /// Shuts the pool down. Calls still waiting for a connection fail with
    /// `Unavailable`; open calls are aborted.
    pub fn close(&self) {
        self.inner.pool.shutdown();
    }
}
