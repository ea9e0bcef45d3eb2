use crate::{
    constants::{FRAME_HEADER_SIZE, FRAME_KIND_OFFSET, FRAME_LENGTH_FIELD_SIZE, FRAME_STREAM_ID_OFFSET},
    frame::{
        Frame, FrameBody, FrameDecodeError, FrameKind,
        frame_reader::{FrameReader, write_bytes, write_i32, write_string, write_u32},
    },
    metadata::Metadata,
    status::{Any, Status},
};

/// Provides encoding and decoding functionality for frames.
///
/// The `FrameCodec` serializes a `Frame` into the byte sequence carried by a
/// single transport message and parses such a sequence back. It is pure: no
/// state is kept between calls.
///
/// Layout (all integers little-endian):
///
/// ```text
/// [stream_id: u32][kind: u8][variant body ...]
/// ```
///
/// Strings and byte blobs are `u32` length-prefixed; lists are `u32`
/// count-prefixed.
pub struct FrameCodec;

impl FrameCodec {
    /// Encodes a `Frame` into a byte vector.
    pub fn encode(frame: &Frame) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + Self::body_size_hint(&frame.body));

        buf.extend(&frame.stream_id.to_le_bytes());
        buf.push(frame.kind() as u8);

        match &frame.body {
            FrameBody::Call { method } => write_string(&mut buf, method),
            FrameBody::Metadata(metadata) => Self::encode_metadata(&mut buf, metadata),
            FrameBody::Ready { count } => write_u32(&mut buf, *count),
            FrameBody::Payload(bytes) => write_bytes(&mut buf, bytes),
            FrameBody::End | FrameBody::Close => {}
            FrameBody::Status(status) => {
                write_i32(&mut buf, status.code);
                write_string(&mut buf, &status.message);
                write_u32(&mut buf, status.details.len() as u32);
                for detail in &status.details {
                    write_string(&mut buf, &detail.type_url);
                    write_bytes(&mut buf, &detail.value);
                }
            }
        }

        buf
    }

    /// Decodes one transport message into a `Frame`.
    ///
    /// Fails if the message is shorter than the header, sets no variant or an
    /// unknown one, has a body that does not parse, or carries bytes beyond
    /// the single variant it declares.
    pub fn decode(buf: &[u8]) -> Result<Frame, FrameDecodeError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(FrameDecodeError::IncompleteHeader);
        }

        let stream_id = u32::from_le_bytes(
            buf[FRAME_STREAM_ID_OFFSET..FRAME_STREAM_ID_OFFSET + FRAME_LENGTH_FIELD_SIZE]
                .try_into()
                .map_err(|_| FrameDecodeError::IncompleteHeader)?,
        );

        let kind = match buf[FRAME_KIND_OFFSET] {
            0 => return Err(FrameDecodeError::MissingVariant),
            raw => FrameKind::try_from(raw).map_err(|_| FrameDecodeError::UnknownVariant(raw))?,
        };

        let mut reader = FrameReader::new(&buf[FRAME_HEADER_SIZE..]);

        let body = match kind {
            FrameKind::Call => FrameBody::Call {
                method: reader.read_string()?,
            },
            FrameKind::Metadata => FrameBody::Metadata(Self::decode_metadata(&mut reader)?),
            FrameKind::Ready => FrameBody::Ready {
                count: reader.read_u32()?,
            },
            FrameKind::Payload => FrameBody::Payload(reader.read_bytes()?),
            FrameKind::End => FrameBody::End,
            FrameKind::Status => {
                let code = reader.read_i32()?;
                let message = reader.read_string()?;
                let detail_count = reader.read_count(2 * FRAME_LENGTH_FIELD_SIZE)?;
                let mut details = Vec::with_capacity(detail_count);
                for _ in 0..detail_count {
                    details.push(Any {
                        type_url: reader.read_string()?,
                        value: reader.read_bytes()?,
                    });
                }
                FrameBody::Status(Status {
                    code,
                    message,
                    details,
                })
            }
            FrameKind::Close => FrameBody::Close,
        };

        // A second variant (or garbage) after the first is not allowed
        if !reader.is_empty() {
            return Err(FrameDecodeError::TrailingBytes);
        }

        Ok(Frame { stream_id, body })
    }

    fn encode_metadata(buf: &mut Vec<u8>, metadata: &Metadata) {
        write_u32(buf, metadata.len() as u32);
        for (key, values) in metadata.iter() {
            write_string(buf, key);
            write_u32(buf, values.len() as u32);
            for value in values {
                write_string(buf, value);
            }
        }
    }

    fn decode_metadata(reader: &mut FrameReader<'_>) -> Result<Metadata, FrameDecodeError> {
        let entry_count = reader.read_count(2 * FRAME_LENGTH_FIELD_SIZE)?;
        let mut metadata = Metadata::new();

        for _ in 0..entry_count {
            let key = reader.read_string()?;
            let value_count = reader.read_count(FRAME_LENGTH_FIELD_SIZE)?;
            let mut values = Vec::with_capacity(value_count);
            for _ in 0..value_count {
                values.push(reader.read_string()?);
            }
            metadata.push_entry(key, values);
        }

        Ok(metadata)
    }

    fn body_size_hint(body: &FrameBody) -> usize {
        match body {
            FrameBody::Call { method } => FRAME_LENGTH_FIELD_SIZE + method.len(),
            FrameBody::Payload(bytes) => FRAME_LENGTH_FIELD_SIZE + bytes.len(),
            FrameBody::Ready { .. } => FRAME_LENGTH_FIELD_SIZE,
            _ => 0,
        }
    }
}
