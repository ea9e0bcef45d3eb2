mod calls;
pub use calls::*;
pub mod constants;
mod macros;
mod message;
pub use message::RpcMessage;
mod method;
pub use method::*;
mod observer;
pub use observer::*;
