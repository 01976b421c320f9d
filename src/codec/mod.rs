//! Codec module - RPC payload encoding seam.
//!
//! The transport only moves opaque byte payloads keyed by handle. Turning a
//! method call into bytes, and reply bytes back into a [`Value`] or a
//! [`Fault`], is the job of a [`PayloadCodec`].
//!
//! - [`XmlRpcCodec`] - XML-RPC using `serde_xmlrpc`, what dedicated servers
//!   speak
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde`, for loopback servers
//!   and tests
//!
//! # Example
//!
//! ```
//! use gbxremote_client::codec::{MsgPackCodec, PayloadCodec, Value};
//!
//! let codec = MsgPackCodec;
//! let bytes = codec.encode_call("system.methodHelp", &[Value::from("GetVersion")]).unwrap();
//! let (method, params) = codec.decode_call(&bytes).unwrap();
//! assert_eq!(method, "system.methodHelp");
//! assert_eq!(params, vec![Value::from("GetVersion")]);
//! ```

mod msgpack;
mod value;
mod xmlrpc;

pub use msgpack::MsgPackCodec;
pub use value::{Fault, Value};
pub use xmlrpc::XmlRpcCodec;

use crate::error::Result;

/// Outcome of a single RPC: a value, or the fault the server returned.
pub type Reply = std::result::Result<Value, Fault>;

/// Marshals method calls and replies to and from byte payloads.
pub trait PayloadCodec {
    /// Encode a method name and its arguments.
    fn encode_call(&self, method: &str, params: &[Value]) -> Result<Vec<u8>>;

    /// Decode a reply payload.
    ///
    /// The outer `Result` fails on malformed bytes; the inner one carries
    /// a server fault.
    fn decode_reply(&self, bytes: &[u8]) -> Result<Reply>;

    /// Decode a server-initiated call (callback payload).
    fn decode_call(&self, bytes: &[u8]) -> Result<(String, Vec<Value>)>;
}

impl<C: PayloadCodec + ?Sized> PayloadCodec for Box<C> {
    fn encode_call(&self, method: &str, params: &[Value]) -> Result<Vec<u8>> {
        (**self).encode_call(method, params)
    }

    fn decode_reply(&self, bytes: &[u8]) -> Result<Reply> {
        (**self).decode_reply(bytes)
    }

    fn decode_call(&self, bytes: &[u8]) -> Result<(String, Vec<Value>)> {
        (**self).decode_call(bytes)
    }
}
