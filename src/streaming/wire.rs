//! Length-prefixed wire codec
//!
//! # TCP Protocol Specification
//!
//! Every message on the socket, in either direction, is framed as:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ Raw bytes (e.g. JPEG)    │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! ## Framing
//!
//! - **Length field**: 4-byte big-endian unsigned integer, payload bytes only
//! - **Payload**: opaque; interpretation is a contract between producer and peer
//! - **Maximum message size**: 16 MiB ([`MAX_FRAME_LEN`])
//! - **Empty payloads**: never encoded; the session skips transmission instead
//!
//! There is no handshake, type tag or checksum. A short or malformed frame
//! cannot be resynchronized, so decode failures are surfaced to the caller.

use crate::error::FramingError;

/// Size of the length prefix in bytes
pub const HEADER_LEN: usize = 4;

/// Largest payload accepted by encode and decode
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encode a payload as a standalone wire message
///
/// Returns a buffer of exactly `HEADER_LEN + payload.len()` bytes.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut buffer = Vec::with_capacity(HEADER_LEN + payload.len());
    encode_into(&mut buffer, payload)?;
    Ok(buffer)
}

/// Encode a payload into a reusable buffer
///
/// The buffer is cleared first, so a session can keep one allocation for
/// the lifetime of its worker.
pub fn encode_into(buffer: &mut Vec<u8>, payload: &[u8]) -> Result<(), FramingError> {
    if payload.is_empty() {
        return Err(FramingError::EmptyPayload);
    }
    if payload.len() > MAX_FRAME_LEN {
        return Err(FramingError::Oversized {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    buffer.clear();
    buffer.reserve(HEADER_LEN + payload.len());
    buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buffer.extend_from_slice(payload);
    Ok(())
}

/// Parse and validate a length prefix
pub fn decode_header(header: [u8; HEADER_LEN]) -> Result<usize, FramingError> {
    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Err(FramingError::EmptyFrame);
    }
    if len > MAX_FRAME_LEN {
        return Err(FramingError::Oversized {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    Ok(len)
}

/// Decode the first message in `bytes`
///
/// Returns the payload slice and the total number of bytes consumed
/// (header included), so callers can walk a buffer holding several
/// messages. Trailing bytes beyond the first message are left untouched.
pub fn decode(bytes: &[u8]) -> Result<(&[u8], usize), FramingError> {
    if bytes.len() < HEADER_LEN {
        return Err(FramingError::Truncated {
            needed: HEADER_LEN,
            available: bytes.len(),
        });
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&bytes[..HEADER_LEN]);
    let len = decode_header(header)?;

    let total = HEADER_LEN + len;
    if bytes.len() < total {
        return Err(FramingError::Truncated {
            needed: total,
            available: bytes.len(),
        });
    }

    Ok((&bytes[HEADER_LEN..total], total))
}
