mod connection_pool;
mod pool_error;

pub use connection_pool::{ConnectionPool, PoolLifecycle, PooledConnection};
pub use pool_error::PoolError;
