//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: need a full header (4 bytes on V1, 8 on V2)
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! The buffer only enforces the size ceiling. Zero length and zero handle
//! are connection-level conditions checked by the transport.
//!
//! When one push carries complete frames followed by an oversized header,
//! the complete frames are returned and the error is held back until
//! [`FrameBuffer::take_error`] or the next push.
//!
//! # Example
//!
//! ```
//! use gbxremote_client::protocol::{build_frame, FrameBuffer, ProtocolVersion};
//!
//! let mut buffer = FrameBuffer::new(ProtocolVersion::V2);
//! let bytes = build_frame(0x8000_0000, b"payload").unwrap();
//!
//! assert!(buffer.push(&bytes[..3]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[3..]).unwrap();
//! assert_eq!(frames[0].payload(), b"payload");
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{FrameHeader, ProtocolVersion};
use super::Frame;
use crate::error::{GbxError, Result};

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete header.
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: FrameHeader, remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Header layout to decode.
    version: ProtocolVersion,
    /// Framing error found after frames that were already returned.
    failed: Option<GbxError>,
}

impl FrameBuffer {
    /// Create a new frame buffer decoding headers laid out for `version`.
    ///
    /// Default capacity: 64KB.
    pub fn new(version: ProtocolVersion) -> Self {
        Self::with_capacity(version, 64 * 1024)
    }

    /// Create a new frame buffer with custom initial capacity.
    pub fn with_capacity(version: ProtocolVersion, capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::WaitingForHeader,
            version,
            failed: None,
        }
    }

    /// Header layout this buffer decodes.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns error as soon as a header announces a payload larger than
    /// 4 MiB, without waiting for the payload. If frames preceding the bad
    /// header were extracted by the same push, they are returned and the
    /// error is deferred.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        if let Some(err) = self.failed.take() {
            return Err(err);
        }
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            match self.try_extract_one() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                Err(err) if frames.is_empty() => return Err(err),
                Err(err) => {
                    self.failed = Some(err);
                    break;
                }
            }
        }

        Ok(frames)
    }

    /// Take the error deferred by the last push, if any.
    pub fn take_error(&mut self) -> Option<GbxError> {
        self.failed.take()
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                let header_size = self.version.response_header_size();
                let Some(header) = FrameHeader::decode(&self.buffer, self.version) else {
                    return Ok(None);
                };

                header.validate_size()?;

                let _ = self.buffer.split_to(header_size);

                if header.payload_length == 0 {
                    return Ok(Some(Frame::new(header, Bytes::new())));
                }

                self.state = State::WaitingForPayload {
                    header,
                    remaining: header.payload_length,
                };

                self.try_extract_one()
            }

            State::WaitingForPayload { header, remaining } => {
                let remaining = *remaining as usize;

                // invariant: bytes buffered < declared length until we return here
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(remaining).freeze();
                let header = *header;

                self.state = State::WaitingForHeader;

                Ok(Some(Frame::new(header, payload)))
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
        self.failed = None;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}
