//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use gbxremote_client::protocol::{Frame, FrameHeader};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(FrameHeader::new(5, 0x8000_0000), Bytes::from_static(b"hello"));
//!
//! assert_eq!(frame.handle(), Some(0x8000_0000));
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{FrameHeader, MAX_PAYLOAD_SIZE, REQUEST_HEADER_SIZE};
use crate::error::{GbxError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: FrameHeader,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: FrameHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Get the handle, if the frame layout carries one.
    #[inline]
    pub fn handle(&self) -> Option<u32> {
        self.header.handle
    }

    /// Check if this is a server-initiated callback.
    #[inline]
    pub fn is_callback(&self) -> bool {
        self.header.is_callback()
    }
}

/// Build a complete request frame as a single byte vector.
///
/// Encodes length and handle, then appends the payload, so the whole
/// request goes out in one write.
///
/// # Errors
///
/// Returns error if the payload exceeds 4 MiB.
///
/// # Example
///
/// ```
/// use gbxremote_client::protocol::build_frame;
///
/// let bytes = build_frame(0x8000_0000, b"hello").unwrap();
/// assert_eq!(bytes.len(), 8 + 5);
/// assert_eq!(&bytes[..4], &[5, 0, 0, 0]);
/// ```
pub fn build_frame(handle: u32, payload: &[u8]) -> Result<Vec<u8>> {
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_SIZE)
        .ok_or_else(|| GbxError::Protocol(format!("request too large ({})", payload.len())))?;

    let header = FrameHeader::new(length, handle);
    let mut buf = Vec::with_capacity(REQUEST_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    Ok(buf)
}
