//! Bulk-stream frame layout
//!
//! Each frame on the bulk stream is written as:
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Bytes 0-3:  Header length L (uint32 big-endian)          │
//! ├──────────────────────────────────────────────────────────┤
//! │ Bytes 4..4+L: FRAME envelope (JSON text)                 │
//! ├──────────────────────────────────────────────────────────┤
//! │ Payload: encoded image bytes, not length-prefixed        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The payload boundary follows from the header's format: for JPEG the
//! payload ends at the end-of-image marker.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Size of the header length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest header a reader accepts
pub const MAX_HEADER_SIZE: usize = 10_000;

/// Largest payload a reader buffers while searching for the boundary
pub const MAX_PAYLOAD_SIZE: usize = 2_000_000;

/// JPEG start-of-image marker
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Encode the 4-byte length prefix for a header
pub fn length_prefix(header_len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE]> {
    let len = u32::try_from(header_len).map_err(|_| Error::HeaderTooLarge(header_len))?;
    Ok(len.to_be_bytes())
}

/// Check a received length prefix against the reader limits
pub fn validate_header_len(len: u32) -> Result<usize> {
    let len_usize = len as usize;
    if len == 0 || len_usize > MAX_HEADER_SIZE {
        return Err(Error::InvalidHeaderLength(len));
    }
    Ok(len_usize)
}

/// Build a complete frame in memory: `len32be(H) || H || P`
pub fn encode_frame(header: &[u8], payload: &[u8]) -> Result<Bytes> {
    let prefix = length_prefix(header.len())?;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + header.len() + payload.len());
    buf.put_slice(&prefix);
    buf.put_slice(header);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Split a buffer into `(header, rest)` using the length prefix.
///
/// `rest` begins with the payload of this frame.
pub fn split_header(buf: &[u8]) -> Result<(&[u8], &[u8])> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return Err(Error::BufferTooSmall {
            needed: LENGTH_PREFIX_SIZE,
            have: buf.len(),
        });
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&buf[..LENGTH_PREFIX_SIZE]);
    let len = validate_header_len(u32::from_be_bytes(prefix))?;

    let needed = LENGTH_PREFIX_SIZE + len;
    if buf.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            have: buf.len(),
        });
    }

    Ok((&buf[LENGTH_PREFIX_SIZE..needed], &buf[needed..]))
}

/// Length of a JPEG payload at the start of `buf`, including the EOI marker.
///
/// Returns `None` if no end-of-image marker is present yet.
pub fn jpeg_end(buf: &[u8]) -> Option<usize> {
    buf.windows(JPEG_EOI.len())
        .position(|w| w == JPEG_EOI)
        .map(|pos| pos + JPEG_EOI.len())
}
