use futures::future::BoxFuture;

/// Runs detached background work for the protocol engine.
///
/// The core never picks an executor itself. Each stream's ordered inbound
/// processing and each channel attachment runs as one spawned task, so the
/// connection's frame pump is never blocked by a slow observer.
pub trait Spawner: Send + Sync + 'static {
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

impl<F> Spawner for F
where
    F: Fn(BoxFuture<'static, ()>) + Send + Sync + 'static,
{
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self(future)
    }
}

/// Spawns onto the ambient tokio runtime.
///
/// Must be used from within a runtime context, as with `tokio::spawn`.
#[cfg(feature = "tokio_support")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

#[cfg(feature = "tokio_support")]
impl Spawner for TokioSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        tokio::spawn(future);
    }
}
