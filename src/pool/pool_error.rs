use crate::status::StatusError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The pool was shut down before a connection became available.
    ShutDown,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::ShutDown => write!(f, "connection pool shut down"),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<PoolError> for StatusError {
    fn from(err: PoolError) -> Self {
        StatusError::unavailable(err.to_string())
    }
}
