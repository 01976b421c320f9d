//! Wire format encoding and decoding.
//!
//! Handshake (server to client, once):
//! ```text
//! ┌──────────────┬─────────────────────────┐
//! │ Header length│ "GBXRemote 1" / "... 2" │
//! │ 4 bytes LE   │ header length bytes     │
//! └──────────────┴─────────────────────────┘
//! ```
//!
//! Request (always) and response/callback (V2):
//! ```text
//! ┌──────────┬──────────┬──────────────┐
//! │ Length   │ Handle   │ Payload      │
//! │ 4 bytes  │ 4 bytes  │ Length bytes │
//! │ uint32 LE│ uint32 LE│              │
//! └──────────┴──────────┴──────────────┘
//! ```
//!
//! Under V1 responses carry only the length field.
//!
//! All multi-byte integers are Little Endian.

use crate::error::{GbxError, Result};

/// Maximum payload size in either direction (4 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 4096 * 1024;

/// Maximum length of the handshake text.
pub const MAX_HANDSHAKE_LEN: u32 = 64;

/// Size of the handshake length prefix.
pub const HANDSHAKE_PREFIX_SIZE: usize = 4;

/// Size of a request header (length + handle).
pub const REQUEST_HEADER_SIZE: usize = 8;

/// High bit of a handle. Set on every client-issued handle; clear on callbacks.
pub const HANDLE_REPLY_BIT: u32 = 0x8000_0000;

/// Handshake text announcing protocol version 1.
pub const HANDSHAKE_V1: &str = "GBXRemote 1";

/// Handshake text announcing protocol version 2.
pub const HANDSHAKE_V2: &str = "GBXRemote 2";

/// Protocol version negotiated during the handshake.
///
/// Fixed for the lifetime of a connection and consulted by the frame
/// decoder to pick the response header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Responses carry no handle field.
    V1,
    /// Responses carry length and handle.
    V2,
}

impl ProtocolVersion {
    /// Parse the handshake text sent by the server.
    ///
    /// # Example
    ///
    /// ```
    /// use gbxremote_client::protocol::ProtocolVersion;
    ///
    /// assert_eq!(ProtocolVersion::from_handshake("GBXRemote 2").unwrap(), ProtocolVersion::V2);
    /// assert!(ProtocolVersion::from_handshake("GBXRemote 3").is_err());
    /// ```
    pub fn from_handshake(text: &str) -> Result<Self> {
        match text {
            HANDSHAKE_V1 => Ok(ProtocolVersion::V1),
            HANDSHAKE_V2 => Ok(ProtocolVersion::V2),
            other => Err(GbxError::Protocol(format!(
                "unsupported protocol version: {:?}",
                other
            ))),
        }
    }

    /// Size of an incoming response header under this version.
    #[inline]
    pub fn response_header_size(self) -> usize {
        match self {
            ProtocolVersion::V1 => 4,
            ProtocolVersion::V2 => 8,
        }
    }

    /// Numeric version as announced in the handshake.
    #[inline]
    pub fn number(self) -> u8 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GBXRemote {}", self.number())
    }
}

/// Validate the handshake length prefix: must lie in `1..=64`.
pub fn validate_handshake_len(len: u32) -> Result<()> {
    if len == 0 || len > MAX_HANDSHAKE_LEN {
        return Err(GbxError::Protocol(format!(
            "wrong lowlevel protocol header (length {})",
            len
        )));
    }
    Ok(())
}

/// Decode the handshake text. Only ASCII is accepted.
pub fn decode_handshake_text(bytes: &[u8]) -> Result<&str> {
    if !bytes.is_ascii() {
        return Err(GbxError::Protocol(
            "handshake header is not ASCII".to_string(),
        ));
    }
    std::str::from_utf8(bytes)
        .map_err(|e| GbxError::Protocol(format!("handshake header is not text: {}", e)))
}

/// Whether a handle identifies a server-initiated callback (high bit clear).
#[inline]
pub fn is_callback_handle(handle: u32) -> bool {
    handle & HANDLE_REPLY_BIT == 0
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length in bytes.
    pub payload_length: u32,
    /// Handle, absent on V1 responses.
    pub handle: Option<u32>,
}

impl FrameHeader {
    /// Create a header carrying a handle.
    pub fn new(payload_length: u32, handle: u32) -> Self {
        Self {
            payload_length,
            handle: Some(handle),
        }
    }

    /// Encode as a request header (length + handle, Little Endian).
    ///
    /// A missing handle is written as 0.
    ///
    /// # Example
    ///
    /// ```
    /// use gbxremote_client::protocol::FrameHeader;
    ///
    /// let bytes = FrameHeader::new(5, 0x8000_0001).encode();
    /// assert_eq!(bytes, [5, 0, 0, 0, 0x01, 0, 0, 0x80]);
    /// ```
    pub fn encode(&self) -> [u8; REQUEST_HEADER_SIZE] {
        let mut buf = [0u8; REQUEST_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.handle.unwrap_or(0).to_le_bytes());
        buf
    }

    /// Decode a header laid out for `version`.
    ///
    /// Returns `None` if the buffer is too short.
    pub fn decode(buf: &[u8], version: ProtocolVersion) -> Option<Self> {
        if buf.len() < version.response_header_size() {
            return None;
        }
        let payload_length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let handle = match version {
            ProtocolVersion::V1 => None,
            ProtocolVersion::V2 => Some(u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]])),
        };
        Some(Self {
            payload_length,
            handle,
        })
    }

    /// Reject payloads above [`MAX_PAYLOAD_SIZE`].
    pub fn validate_size(&self) -> Result<()> {
        if self.payload_length > MAX_PAYLOAD_SIZE {
            return Err(GbxError::Protocol(format!(
                "response too large ({})",
                self.payload_length
            )));
        }
        Ok(())
    }

    /// Whether this header belongs to a callback frame.
    #[inline]
    pub fn is_callback(&self) -> bool {
        self.handle.is_some_and(is_callback_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_little_endian_byte_order() {
        let header = FrameHeader::new(0x0403_0201, 0x8807_0605);
        let bytes = header.encode();
        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x88]);
    }

    #[test]
    fn test_decode_v2_reads_handle() {
        let bytes = FrameHeader::new(42, 0x8000_0010).encode();
        let header = FrameHeader::decode(&bytes, ProtocolVersion::V2).unwrap();
        assert_eq!(header.payload_length, 42);
        assert_eq!(header.handle, Some(0x8000_0010));
    }

    #[test]
    fn test_decode_v1_has_no_handle() {
        let bytes = [7u8, 0, 0, 0];
        let header = FrameHeader::decode(&bytes, ProtocolVersion::V1).unwrap();
        assert_eq!(header.payload_length, 7);
        assert_eq!(header.handle, None);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(FrameHeader::decode(&[0u8; 7], ProtocolVersion::V2).is_none());
        assert!(FrameHeader::decode(&[0u8; 3], ProtocolVersion::V1).is_none());
    }

    #[test]
    fn test_size_limit_boundary() {
        assert!(FrameHeader::new(MAX_PAYLOAD_SIZE, 1).validate_size().is_ok());
        let err = FrameHeader::new(MAX_PAYLOAD_SIZE + 1, 1)
            .validate_size()
            .unwrap_err();
        assert!(err.to_string().contains("response too large"));
    }

    #[test]
    fn test_callback_bit() {
        assert!(is_callback_handle(0x0000_0001));
        assert!(is_callback_handle(0x7FFF_FFFF));
        assert!(!is_callback_handle(0x8000_0000));
        assert!(FrameHeader::new(1, 5).is_callback());
        assert!(!FrameHeader::new(1, 0x8000_0005).is_callback());
    }

    #[test]
    fn test_version_from_handshake() {
        assert_eq!(
            ProtocolVersion::from_handshake("GBXRemote 1").unwrap(),
            ProtocolVersion::V1
        );
        assert_eq!(
            ProtocolVersion::from_handshake("GBXRemote 2").unwrap(),
            ProtocolVersion::V2
        );
        let err = ProtocolVersion::from_handshake("GBX1").unwrap_err();
        assert!(err.to_string().contains("unsupported protocol version"));
    }

    #[test]
    fn test_handshake_len_bounds() {
        assert!(validate_handshake_len(0).is_err());
        assert!(validate_handshake_len(1).is_ok());
        assert!(validate_handshake_len(64).is_ok());
        assert!(validate_handshake_len(65).is_err());
    }

    #[test]
    fn test_handshake_text_must_be_ascii() {
        assert_eq!(decode_handshake_text(b"GBXRemote 2").unwrap(), "GBXRemote 2");
        assert!(decode_handshake_text("GBXRémote".as_bytes()).is_err());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(ProtocolVersion::V2.to_string(), "GBXRemote 2");
        assert_eq!(ProtocolVersion::V1.response_header_size(), 4);
        assert_eq!(ProtocolVersion::V2.response_header_size(), 8);
    }
}
