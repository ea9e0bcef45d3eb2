use crate::{frame::FrameDecodeError, status::StatusError, transport::TransportError};
use std::fmt;

/// Why a connection refused an operation or was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection has already been torn down.
    Closed,

    /// Every stream id this connection could hand out has been used.
    StreamIdsExhausted,

    /// An inbound message did not decode as a frame.
    MalformedFrame(FrameDecodeError),

    /// An inbound frame named a stream id this connection never allocated.
    UnknownStream(u32),

    /// The peer tried to open a call on this (client-only) connection.
    UnexpectedCall(u32),

    /// The transport reported closure.
    Transport(TransportError),
}

impl ConnectionError {
    /// Protocol violations are fatal to the whole connection.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ConnectionError::MalformedFrame(_)
                | ConnectionError::UnknownStream(_)
                | ConnectionError::UnexpectedCall(_)
        )
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Closed => write!(f, "connection closed"),
            ConnectionError::StreamIdsExhausted => write!(f, "stream ids exhausted"),
            ConnectionError::MalformedFrame(err) => write!(f, "{err}"),
            ConnectionError::UnknownStream(id) => write!(f, "frame for unknown stream {id}"),
            ConnectionError::UnexpectedCall(id) => write!(f, "unexpected Call frame on stream {id}"),
            ConnectionError::Transport(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::MalformedFrame(err) => Some(err),
            ConnectionError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FrameDecodeError> for ConnectionError {
    fn from(err: FrameDecodeError) -> Self {
        ConnectionError::MalformedFrame(err)
    }
}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        ConnectionError::Transport(err)
    }
}

impl From<ConnectionError> for StatusError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Closed => StatusError::unavailable("connection closed"),
            ConnectionError::StreamIdsExhausted => StatusError::unavailable("stream ids exhausted"),
            other => StatusError::connection_lost(other),
        }
    }
}
