use std::io;

/// A message type that can travel as a stream payload.
///
/// The encoding is up to the implementor; the tunnel only ever sees bytes.
pub trait RpcMessage: Sized + Send + Sync + 'static {
    fn encode(&self) -> Result<Vec<u8>, io::Error>;

    fn decode(bytes: &[u8]) -> Result<Self, io::Error>;
}
