use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Wire tag selecting which single variant a frame carries.
///
/// `0` is unassigned: a frame tagged with it has no variant set and is
/// rejected by the decoder.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
pub enum FrameKind {
    Call = 1,
    Metadata = 2,
    Ready = 3,
    Payload = 4,
    End = 5,
    Status = 6,
    Close = 7,
}
