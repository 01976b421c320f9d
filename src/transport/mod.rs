//! Transport module - connection lifecycle and framing.
//!
//! Provides:
//! - TCP connect and GBXRemote handshake
//! - Request frame writes and response/callback frame reads
//! - Read timeout and V1 handle settings

mod connection;

pub use connection::{Transport, TransportConfig, V1Handles};
