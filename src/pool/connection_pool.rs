use crate::{pool::PoolError, spawner::Spawner, utils::lock};
use futures::{FutureExt, channel::oneshot};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, Weak},
};

/// What the pool needs to know about the connections it manages.
pub trait PooledConnection: Send + Sync + 'static {
    fn is_closed(&self) -> bool;

    fn close(&self);
}

type Factory<C> = dyn Fn(PoolLifecycle<C>) -> Arc<C> + Send + Sync;

/// Keeps a target number of connections open or opening, replacing each one
/// that closes.
///
/// Connections are created by an injected factory, which hands every new
/// connection a [`PoolLifecycle`] to report readiness and closure with.
/// Reconnection is unconditional and immediate: a closed connection is
/// replaced in the same reaction that reported the closure. A connection
/// that closes while the factory is still creating it is retried from a
/// task on the injected [`Spawner`] instead.
///
/// Acquisition always resolves to the first connection that became active,
/// so connections beyond the first act as standbys rather than sharing load.
pub struct ConnectionPool<C: PooledConnection> {
    shared: Arc<PoolShared<C>>,
}

struct PoolShared<C: PooledConnection> {
    factory: Box<Factory<C>>,
    spawner: Arc<dyn Spawner>,
    state: Mutex<PoolState<C>>,
}

struct PoolState<C> {
    target: usize,
    pending: Vec<Arc<C>>,
    active: Vec<Arc<C>>,
    waiters: VecDeque<oneshot::Sender<Arc<C>>>,
    // Set while the factory runs, so a connection that fails synchronously
    // inside the factory cannot recurse into another fill.
    refilling: bool,
    shut_down: bool,
}

/// Handle a pooled connection uses to report its lifecycle back to the pool.
///
/// Holds the pool weakly; reports after the pool is gone are ignored.
pub struct PoolLifecycle<C: PooledConnection> {
    pool: Weak<PoolShared<C>>,
}

impl<C: PooledConnection> Clone for PoolLifecycle<C> {
    fn clone(&self) -> Self {
        Self {
            pool: Weak::clone(&self.pool),
        }
    }
}

impl<C: PooledConnection> PoolLifecycle<C> {
    /// Moves `connection` from pending to active and hands it to every
    /// queued acquisition.
    pub fn connection_active(&self, connection: &Arc<C>) {
        if let Some(pool) = self.pool.upgrade() {
            pool.on_active(connection);
        }
    }

    /// Forgets `connection` and immediately asks the factory for a
    /// replacement.
    pub fn connection_closed(&self, connection: &Arc<C>) {
        if let Some(pool) = self.pool.upgrade() {
            pool.on_closed(connection);
            pool.fill();
        }
    }
}

impl<C: PooledConnection> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: PooledConnection> ConnectionPool<C> {
    /// Creates the pool and immediately starts `target` connections.
    pub fn new<F>(target: usize, spawner: Arc<dyn Spawner>, factory: F) -> Self
    where
        F: Fn(PoolLifecycle<C>) -> Arc<C> + Send + Sync + 'static,
    {
        let pool = Self {
            shared: Arc::new(PoolShared {
                factory: Box::new(factory),
                spawner,
                state: Mutex::new(PoolState {
                    target,
                    pending: Vec::new(),
                    active: Vec::new(),
                    waiters: VecDeque::new(),
                    refilling: false,
                    shut_down: false,
                }),
            }),
        };

        pool.shared.fill();
        pool
    }

    /// Resolves with an active connection, waiting for one to become active
    /// if necessary. Waiters are served in the order they called `acquire`.
    pub async fn acquire(&self) -> Result<Arc<C>, PoolError> {
        let granted = {
            let mut state = lock(&self.shared.state);
            if state.shut_down {
                return Err(PoolError::ShutDown);
            }
            if let Some(connection) = state.active.first() {
                return Ok(Arc::clone(connection));
            }

            let (grant, granted) = oneshot::channel();
            state.waiters.push_back(grant);
            granted
        };

        // Dropping the sender (on shutdown) cancels the wait
        granted.await.map_err(|_| PoolError::ShutDown)
    }

    /// Changes the number of connections kept open or opening.
    ///
    /// Growing starts new connections right away. Shrinking closes nothing;
    /// surplus connections simply are not replaced when they close.
    pub fn set_target_size(&self, target: usize) {
        lock(&self.shared.state).target = target;
        self.shared.fill();
    }

    /// Stops reconnecting, closes every connection and fails all queued
    /// acquisitions. Idempotent.
    pub fn shutdown(&self) {
        let connections = {
            let mut state = lock(&self.shared.state);
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            state.waiters.clear();

            let mut connections = std::mem::take(&mut state.active);
            connections.append(&mut state.pending);
            connections
        };

        tracing::debug!(connections = connections.len(), "shutting down connection pool");

        for connection in connections {
            connection.close();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.shared.state).shut_down
    }

    pub fn target_size(&self) -> usize {
        lock(&self.shared.state).target
    }

    pub fn active_count(&self) -> usize {
        lock(&self.shared.state).active.len()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.shared.state).pending.len()
    }
}

impl<C: PooledConnection> PoolShared<C> {
    /// Invokes the factory until `pending + active` reaches the target.
    fn fill(self: &Arc<Self>) {
        loop {
            {
                let mut state = lock(&self.state);
                if state.shut_down
                    || state.refilling
                    || state.pending.len() + state.active.len() >= state.target
                {
                    return;
                }
                state.refilling = true;
            }

            // The factory may report lifecycle events synchronously, so it
            // runs without the lock held.
            let connection = (self.factory)(PoolLifecycle {
                pool: Arc::downgrade(self),
            });
            let closed_early = connection.is_closed();

            let rejected = {
                let mut state = lock(&self.state);
                state.refilling = false;

                if state.shut_down {
                    Some(connection)
                } else {
                    let tracked = state.active.iter().any(|c| Arc::ptr_eq(c, &connection));
                    if !closed_early && !tracked {
                        state.pending.push(connection);
                    }
                    None
                }
            };

            if let Some(connection) = rejected {
                connection.close();
                return;
            }

            if closed_early {
                // Its closure was reported while `refilling` was set, so
                // nothing else will replace it
                tracing::warn!("new pooled connection closed during creation; retrying");
                self.schedule_fill();
                return;
            }
        }
    }

    fn schedule_fill(self: &Arc<Self>) {
        let pool = Arc::downgrade(self);
        self.spawner.spawn(
            async move {
                if let Some(pool) = pool.upgrade() {
                    pool.fill();
                }
            }
            .boxed(),
        );
    }

    fn on_active(&self, connection: &Arc<C>) {
        let waiters = {
            let mut state = lock(&self.state);
            if state.shut_down {
                None
            } else {
                state.pending.retain(|c| !Arc::ptr_eq(c, connection));
                if !state.active.iter().any(|c| Arc::ptr_eq(c, connection)) {
                    state.active.push(Arc::clone(connection));
                }
                Some(std::mem::take(&mut state.waiters))
            }
        };

        let Some(waiters) = waiters else {
            connection.close();
            return;
        };

        tracing::debug!(waiters = waiters.len(), "pooled connection active");

        for waiter in waiters {
            // A waiter whose acquire was dropped is simply skipped
            let _ = waiter.send(Arc::clone(connection));
        }
    }

    fn on_closed(&self, connection: &Arc<C>) {
        let mut state = lock(&self.state);
        state.pending.retain(|c| !Arc::ptr_eq(c, connection));
        state.active.retain(|c| !Arc::ptr_eq(c, connection));

        tracing::debug!(
            active = state.active.len(),
            pending = state.pending.len(),
            "pooled connection closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeConnection {
        closed: AtomicBool,
    }

    impl PooledConnection for FakeConnection {
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    type Created = Arc<Mutex<Vec<(Arc<FakeConnection>, PoolLifecycle<FakeConnection>)>>>;

    /// Holds spawned futures until the test runs them.
    #[derive(Clone, Default)]
    struct QueuedSpawner {
        queued: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
    }

    impl QueuedSpawner {
        fn run_all(&self) -> usize {
            let queued = std::mem::take(&mut *self.queued.lock().unwrap());
            let count = queued.len();
            for future in queued {
                assert!(future.now_or_never().is_some());
            }
            count
        }
    }

    impl Spawner for QueuedSpawner {
        fn spawn(&self, future: BoxFuture<'static, ()>) {
            self.queued.lock().unwrap().push(future);
        }
    }

    /// A pool whose factory closes the first `fail_first` connections before
    /// returning them, reporting the closure synchronously.
    fn pool_with_failures(
        target: usize,
        fail_first: usize,
    ) -> (ConnectionPool<FakeConnection>, Created, QueuedSpawner) {
        let created: Created = Arc::new(Mutex::new(Vec::new()));
        let spawner = QueuedSpawner::default();
        let pool = ConnectionPool::new(target, Arc::new(spawner.clone()), {
            let created = Arc::clone(&created);
            move |lifecycle: PoolLifecycle<FakeConnection>| {
                let attempt = created.lock().unwrap().len();
                let connection = Arc::new(FakeConnection {
                    closed: AtomicBool::new(false),
                });
                created
                    .lock()
                    .unwrap()
                    .push((Arc::clone(&connection), lifecycle.clone()));

                if attempt < fail_first {
                    connection.close();
                    lifecycle.connection_closed(&connection);
                }
                connection
            }
        });
        (pool, created, spawner)
    }

    fn recording_pool(target: usize) -> (ConnectionPool<FakeConnection>, Created) {
        let (pool, created, _) = pool_with_failures(target, 0);
        (pool, created)
    }

    #[test]
    fn fills_to_target_on_creation() {
        let (pool, created) = recording_pool(3);
        assert_eq!(created.lock().unwrap().len(), 3);
        assert_eq!(pool.pending_count(), 3);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn closed_connection_is_replaced_immediately() {
        let (pool, created) = recording_pool(1);
        let (connection, lifecycle) = created.lock().unwrap()[0].clone();

        lifecycle.connection_active(&connection);
        assert_eq!(pool.active_count(), 1);

        lifecycle.connection_closed(&connection);
        assert_eq!(created.lock().unwrap().len(), 2);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.pending_count(), 1);
    }

    #[test]
    fn acquire_resolves_to_first_active_connection() {
        let (pool, created) = recording_pool(2);
        let (first, first_lifecycle) = created.lock().unwrap()[0].clone();
        let (second, second_lifecycle) = created.lock().unwrap()[1].clone();

        second_lifecycle.connection_active(&second);
        first_lifecycle.connection_active(&first);

        let acquired = pool.acquire().now_or_never().unwrap().unwrap();
        assert!(Arc::ptr_eq(&acquired, &second));
    }

    #[test]
    fn shutdown_fails_queued_acquisitions_and_stops_reconnecting() {
        let (pool, created) = recording_pool(1);
        let mut waiting = Box::pin(pool.acquire());
        assert!((&mut waiting).now_or_never().is_none());

        pool.shutdown();
        assert!(matches!(
            waiting.now_or_never(),
            Some(Err(PoolError::ShutDown))
        ));

        let (connection, lifecycle) = created.lock().unwrap()[0].clone();
        assert!(connection.is_closed());
        lifecycle.connection_closed(&connection);
        assert_eq!(created.lock().unwrap().len(), 1);
    }

    #[test]
    fn connection_closing_inside_factory_is_retried_from_a_task() {
        let (pool, created, spawner) = pool_with_failures(1, 1);
        assert_eq!(created.lock().unwrap().len(), 1);
        assert_eq!(pool.pending_count(), 0);

        assert_eq!(spawner.run_all(), 1);

        assert_eq!(created.lock().unwrap().len(), 2);
        assert_eq!(pool.pending_count(), 1);

        let (connection, lifecycle) = created.lock().unwrap()[1].clone();
        lifecycle.connection_active(&connection);
        let acquired = pool.acquire().now_or_never().unwrap().unwrap();
        assert!(Arc::ptr_eq(&acquired, &connection));
    }

    #[test]
    fn repeated_synchronous_failures_keep_retrying() {
        let (pool, created, spawner) = pool_with_failures(1, 3);

        while pool.pending_count() == 0 {
            assert_eq!(spawner.run_all(), 1);
        }
        assert_eq!(created.lock().unwrap().len(), 4);
    }
}
