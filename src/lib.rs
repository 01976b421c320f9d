//! # gbxremote-client
//!
//! Async client for the GBXRemote protocol, the remote-procedure-call
//! channel a dedicated game server exposes over TCP.
//!
//! ## Architecture
//!
//! - **Transport**: handshake, length-prefixed little-endian framing
//! - **Dispatcher**: handle allocation, reply correlation, callback routing
//! - **Catalog**: introspection of the server's methods
//!
//! Payload encoding is pluggable through [`codec::PayloadCodec`];
//! [`codec::XmlRpcCodec`] speaks what dedicated servers expect.
//!
//! ## Example
//!
//! ```ignore
//! use gbxremote_client::{codec::XmlRpcCodec, Client};
//!
//! #[tokio::main]
//! async fn main() -> gbxremote_client::Result<()> {
//!     let mut client = Client::builder("127.0.0.1", 5000)
//!         .connect(XmlRpcCodec)
//!         .await?;
//!
//!     let catalog = client.populate_catalog().await?;
//!     println!("{}", catalog.to_json_pretty()?);
//!
//!     client.close().await
//! }
//! ```

pub mod catalog;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod transport;

mod client;

pub use catalog::{MethodCatalog, MethodDescriptor};
pub use client::{Client, ClientBuilder};
pub use codec::{Fault, Reply, Value};
pub use dispatch::{Callback, CallbackSink, Dispatcher};
pub use error::{GbxError, Result};
