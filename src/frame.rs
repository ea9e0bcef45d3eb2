mod frame_codec;
mod frame_error;
mod frame_kind;
mod frame_reader;
mod frame_struct;

pub use frame_codec::FrameCodec;
pub use frame_error::FrameDecodeError;
pub use frame_kind::FrameKind;
pub use frame_struct::{Frame, FrameBody};
