//! Error types for gbxremote-client.

use std::time::Duration;

use thiserror::Error;

use crate::codec::Fault;

/// Main error type for all GBXRemote operations.
///
/// Every variant except [`GbxError::Fault`] and [`GbxError::UnexpectedValue`]
/// leaves the connection unusable; see [`GbxError::is_fatal`].
#[derive(Debug, Error)]
pub enum GbxError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error (bad handshake, malformed or oversized frame).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Peer closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Configured read timeout elapsed.
    #[error("Read timed out after {0:?}")]
    Timeout(Duration),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// XML-RPC encoding or decoding error.
    #[error("XML-RPC error: {0}")]
    XmlRpc(#[from] serde_xmlrpc::Error),

    /// JSON serialization error (catalog export).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server fault where the call site has no way to return it as a value.
    #[error("Server fault: {0}")]
    Fault(#[from] Fault),

    /// Reply decoded fine but does not have the shape the caller requires.
    #[error("Unexpected value: {0}")]
    UnexpectedValue(String),
}

impl GbxError {
    /// Whether the connection must be discarded after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GbxError::Fault(_) | GbxError::UnexpectedValue(_))
    }
}

/// Result type alias using GbxError.
pub type Result<T> = std::result::Result<T, GbxError>;
