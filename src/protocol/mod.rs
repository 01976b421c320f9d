//! Protocol module - wire format, framing, and handles.
//!
//! This module implements the GBXRemote binary layer:
//! - Handshake parsing and protocol version selection
//! - Little-endian length/handle headers
//! - Frame buffer for accumulating partial reads
//! - Handle sequencing for request correlation

mod frame;
mod frame_buffer;
mod handle;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use handle::{HandleGenerator, MAX_HANDLE};
pub use wire_format::{
    decode_handshake_text, is_callback_handle, validate_handshake_len, FrameHeader,
    ProtocolVersion, HANDLE_REPLY_BIT, HANDSHAKE_PREFIX_SIZE, HANDSHAKE_V1, HANDSHAKE_V2,
    MAX_HANDSHAKE_LEN, MAX_PAYLOAD_SIZE, REQUEST_HEADER_SIZE,
};
