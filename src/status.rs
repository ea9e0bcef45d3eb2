use crate::metadata::Metadata;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Well-known status codes (the gRPC code space).
///
/// `Status` itself stores the raw `i32` so that codes outside this list are
/// still delivered verbatim.
#[repr(i32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

/// An opaque, typed detail blob attached to a status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Any {
    pub type_url: String,
    pub value: Vec<u8>,
}

/// Terminal outcome of one call as carried by a `Status` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub code: i32,
    pub message: String,
    pub details: Vec<Any>,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.code == i32::from(Code::Ok)
    }

    /// The code as a known [`Code`], if it is one.
    pub fn known_code(&self) -> Option<Code> {
        Code::try_from(self.code).ok()
    }
}

/// A failed call: the non-zero status plus whatever trailer accompanied it.
///
/// This is the only error type callers ever see from a call. Transport
/// failures, protocol violations, local cancellation and remote RPC errors
/// all arrive as a `StatusError` through the stream observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    pub status: Status,
    pub trailer: Metadata,
}

impl StatusError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self::from_status(Status::new(code, message), Metadata::new())
    }

    pub fn from_status(status: Status, trailer: Metadata) -> Self {
        Self { status, trailer }
    }

    /// The status synthesized when a call ends without the peer ever
    /// reporting a real one.
    pub fn aborted() -> Self {
        Self::new(Code::Unknown, "Call aborted.")
    }

    /// The status synthesized when the connection under a call is lost.
    pub fn connection_lost(reason: impl fmt::Display) -> Self {
        Self::new(Code::Unknown, format!("Call aborted: {reason}"))
    }

    pub fn cancelled() -> Self {
        Self::new(Code::Cancelled, "Call cancelled.")
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn code(&self) -> i32 {
        self.status.code
    }

    pub fn known_code(&self) -> Option<Code> {
        self.status.known_code()
    }

    pub fn message(&self) -> &str {
        &self.status.message
    }

    pub fn details(&self) -> &[Any] {
        &self.status.details
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_code() {
            Some(code) => write!(f, "{:?} ({}): {}", code, self.code(), self.message()),
            None => write!(f, "status {}: {}", self.code(), self.message()),
        }
    }
}

impl std::error::Error for StatusError {}
