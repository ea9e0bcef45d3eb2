use crate::{constants::FRAME_LENGTH_FIELD_SIZE, frame::FrameDecodeError};

/// Bounds-checked little-endian cursor over a frame body.
pub(crate) struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FrameDecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or(FrameDecodeError::Truncated)?;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or(FrameDecodeError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], FrameDecodeError> {
        self.take(N)?
            .try_into()
            .map_err(|_| FrameDecodeError::Truncated)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, FrameDecodeError> {
        Ok(u32::from_le_bytes(self.take_array::<FRAME_LENGTH_FIELD_SIZE>()?))
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, FrameDecodeError> {
        Ok(i32::from_le_bytes(self.take_array::<4>()?))
    }

    pub(crate) fn read_bytes(&mut self) -> Result<Vec<u8>, FrameDecodeError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub(crate) fn read_string(&mut self) -> Result<String, FrameDecodeError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| FrameDecodeError::InvalidUtf8)
    }

    /// Reads an element count, rejecting counts that could not possibly fit
    /// in the remaining bytes (each element occupies at least `min_size`).
    pub(crate) fn read_count(&mut self, min_size: usize) -> Result<usize, FrameDecodeError> {
        let count = self.read_u32()? as usize;
        let remaining = self.buf.len().saturating_sub(self.pos);
        if count.saturating_mul(min_size.max(1)) > remaining {
            return Err(FrameDecodeError::Truncated);
        }
        Ok(count)
    }
}

/// Little-endian writers matching [`FrameReader`].
pub(crate) fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend(&value.to_le_bytes());
}

pub(crate) fn write_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend(&value.to_le_bytes());
}

pub(crate) fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(buf, bytes.len() as u32);
    buf.extend(bytes);
}

pub(crate) fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_bytes(buf, value.as_bytes());
}
