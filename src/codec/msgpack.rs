//! MsgPack codec using `rmp-serde`.
//!
//! Always encodes with `to_vec_named` so structs go out as maps (with field
//! names) rather than positional arrays.
//!
//! Payload layouts:
//! - call: `{ "method": str, "params": [Value] }`
//! - reply: `{ "Ok": Value }` or `{ "Fault": { "code": int, "message": str } }`
//!
//! # Example
//!
//! ```
//! use gbxremote_client::codec::{Fault, MsgPackCodec, PayloadCodec, Value};
//!
//! let bytes = MsgPackCodec::encode_reply(&Err(Fault::new(-1, "nope"))).unwrap();
//! let reply = MsgPackCodec.decode_reply(&bytes).unwrap();
//! assert_eq!(reply, Err(Fault::new(-1, "nope")));
//! ```

use serde::{Deserialize, Serialize};

use super::{Fault, PayloadCodec, Reply, Value};
use crate::error::Result;

/// MessagePack implementation of [`PayloadCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

#[derive(Serialize)]
struct CallRef<'a> {
    method: &'a str,
    params: &'a [Value],
}

#[derive(Deserialize)]
struct CallOwned {
    method: String,
    params: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
enum ReplyBody {
    Ok(Value),
    Fault(Fault),
}

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Encode a reply, as a server would send it.
    pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>> {
        let body = match reply {
            Ok(value) => ReplyBody::Ok(value.clone()),
            Err(fault) => ReplyBody::Fault(fault.clone()),
        };
        Self::encode(&body)
    }
}

impl PayloadCodec for MsgPackCodec {
    fn encode_call(&self, method: &str, params: &[Value]) -> Result<Vec<u8>> {
        Self::encode(&CallRef { method, params })
    }

    fn decode_reply(&self, bytes: &[u8]) -> Result<Reply> {
        Ok(match Self::decode::<ReplyBody>(bytes)? {
            ReplyBody::Ok(value) => Ok(value),
            ReplyBody::Fault(fault) => Err(fault),
        })
    }

    fn decode_call(&self, bytes: &[u8]) -> Result<(String, Vec<Value>)> {
        let call: CallOwned = Self::decode(bytes)?;
        Ok((call.method, call.params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_call_round_trip() {
        let codec = MsgPackCodec;
        let params = vec![Value::from("SuperAdmin"), Value::from("SuperAdmin")];

        let bytes = codec.encode_call("Authenticate", &params).unwrap();
        let (method, decoded) = codec.decode_call(&bytes).unwrap();

        assert_eq!(method, "Authenticate");
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_call_uses_map_format() {
        let bytes = MsgPackCodec.encode_call("system.listMethods", &[]).unwrap();
        // fixmap with 2 entries
        assert_eq!(bytes[0], 0x82);
    }

    #[test]
    fn test_reply_value() {
        let mut members = BTreeMap::new();
        members.insert("Name".to_string(), Value::from("TmForever"));
        members.insert("Build".to_string(), Value::from(2011));
        members.insert("Blob".to_string(), Value::Base64(vec![0, 1, 2, 255]));
        members.insert("Ratio".to_string(), Value::from(0.25));
        members.insert("Missing".to_string(), Value::Nil);
        let value = Value::Struct(members);

        let bytes = MsgPackCodec::encode_reply(&Ok(value.clone())).unwrap();
        assert_eq!(MsgPackCodec.decode_reply(&bytes).unwrap(), Ok(value));
    }

    #[test]
    fn test_reply_fault() {
        let fault = Fault::new(-32601, "server error. requested method not found");
        let bytes = MsgPackCodec::encode_reply(&Err(fault.clone())).unwrap();
        assert_eq!(MsgPackCodec.decode_reply(&bytes).unwrap(), Err(fault));
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result = MsgPackCodec.decode_reply(b"not valid msgpack");
        assert!(result.is_err());
    }

    #[test]
    fn test_reply_is_not_a_call() {
        let bytes = MsgPackCodec::encode_reply(&Ok(Value::from(1))).unwrap();
        assert!(MsgPackCodec.decode_call(&bytes).is_err());
    }
}
