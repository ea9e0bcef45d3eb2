// Frame related constants
pub const FRAME_STREAM_ID_OFFSET: usize = 0;
pub const FRAME_KIND_OFFSET: usize = 4;
pub const FRAME_HEADER_SIZE: usize = 5;

/// Size in bytes of every length and count prefix inside a frame body (u32).
pub const FRAME_LENGTH_FIELD_SIZE: usize = 4;

/// The first stream id handed out by a fresh connection.
///
/// Ids increase strictly from here and are never reused for the lifetime of
/// the connection, so a late frame for a finished stream can never be
/// attributed to a newer one.
pub const FIRST_STREAM_ID: u32 = 7;

/// How many locally closed streams a connection remembers, so frames the
/// peer sent before seeing our `Close` can be dropped instead of failing the
/// connection.
pub const CLOSED_STREAM_RETENTION: usize = 1024;

/// Receive credit granted to the peer when a stream opens, unless the call
/// options say otherwise. The local send window starts at the same value.
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 64 * 1024;

/// Number of connections a pool keeps open (or opening) by default.
pub const DEFAULT_POOL_SIZE: usize = 1;
