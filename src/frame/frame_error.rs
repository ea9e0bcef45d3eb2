use std::fmt;

/// A byte sequence that is not a well-formed frame.
///
/// Any of these is a protocol violation: the connection that received it is
/// torn down rather than the single call it may have been meant for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDecodeError {
    /// Fewer bytes than the fixed stream id + kind header.
    IncompleteHeader,

    /// The kind byte is zero, i.e. no variant is set.
    MissingVariant,

    /// The kind byte names no known variant.
    UnknownVariant(u8),

    /// A length or count prefix points past the end of the buffer.
    Truncated,

    /// A string field is not valid UTF-8.
    InvalidUtf8,

    /// Bytes remain after the single variant was decoded.
    TrailingBytes,
}

impl fmt::Display for FrameDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDecodeError::IncompleteHeader => write!(f, "malformed frame: incomplete header"),
            FrameDecodeError::MissingVariant => write!(f, "malformed frame: no variant set"),
            FrameDecodeError::UnknownVariant(kind) => {
                write!(f, "malformed frame: unknown variant {kind}")
            }
            FrameDecodeError::Truncated => write!(f, "malformed frame: truncated body"),
            FrameDecodeError::InvalidUtf8 => write!(f, "malformed frame: invalid utf-8 string"),
            FrameDecodeError::TrailingBytes => {
                write!(f, "malformed frame: trailing bytes after variant")
            }
        }
    }
}

impl std::error::Error for FrameDecodeError {}
