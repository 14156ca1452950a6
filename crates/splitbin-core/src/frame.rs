//! Size-prefixed Frame Codec
//!
//! Every record in a bin file is stored as one frame:
//!
//! ```text
//! ┌───────────────┬──────────────────────┐
//! │ length (u32)  │ payload              │
//! │ little-endian │ exactly length bytes │
//! └───────────────┴──────────────────────┘
//! ```
//!
//! Zero-length payloads are legal frames (4 bytes of zeros on disk).
//!
//! Encoding always goes through a single buffer so the caller can issue one
//! `write_all` per record: a crash can leave a partial frame at the end of a
//! bin file, but never a complete prefix followed by a foreign payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Number of bytes in the length prefix.
pub const LEN_PREFIX: usize = 4;

/// Append one frame (prefix + payload) to `buf`.
pub fn encode_frame(buf: &mut BytesMut, payload: &[u8]) -> Result<()> {
    let length = u32::try_from(payload.len()).map_err(|_| Error::RecordTooLarge {
        length: payload.len() as u64,
    })?;
    buf.reserve(LEN_PREFIX + payload.len());
    buf.put_u32_le(length);
    buf.put_slice(payload);
    Ok(())
}

/// Decode the next frame from `data`, advancing past it.
///
/// Returns `Ok(None)` at a clean end of input. A partial prefix, or a prefix
/// claiming more bytes than remain, is a truncation error. The returned
/// payload is a zero-copy slice of `data`.
pub fn decode_frame(data: &mut Bytes) -> Result<Option<Bytes>> {
    if data.is_empty() {
        return Ok(None);
    }
    if data.len() < LEN_PREFIX {
        return Err(Error::Truncated {
            expected: LEN_PREFIX as u32,
            remaining: data.len() as u64,
        });
    }

    let length = u32::from_le_bytes(data[..LEN_PREFIX].try_into().unwrap());
    let remaining = (data.len() - LEN_PREFIX) as u64;
    if remaining < length as u64 {
        return Err(Error::Truncated {
            expected: length,
            remaining,
        });
    }

    data.advance(LEN_PREFIX);
    Ok(Some(data.split_to(length as usize)))
}

/// Decode every frame in `data`, in on-disk order.
pub fn decode_all_frames(mut data: Bytes) -> Result<Vec<Bytes>> {
    let mut frames = Vec::new();
    while let Some(payload) = decode_frame(&mut data)? {
        frames.push(payload);
    }
    Ok(frames)
}
