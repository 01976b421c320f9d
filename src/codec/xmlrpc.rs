//! XML-RPC codec using `serde_xmlrpc`.
//!
//! This is the payload format dedicated servers speak. Payloads are UTF-8
//! `<methodCall>` and `<methodResponse>` documents; a `<fault>` response
//! decodes to [`Fault`].
//!
//! Integers that fit in 32 bits go out as `<i4>`, wider ones as `<i8>`.
//!
//! # Example
//!
//! ```ignore
//! use gbxremote_client::codec::{PayloadCodec, Value, XmlRpcCodec};
//!
//! let bytes = XmlRpcCodec.encode_call("system.methodHelp", &[Value::from("GetVersion")])?;
//! let (method, params) = XmlRpcCodec.decode_call(&bytes)?;
//! ```

use serde_xmlrpc::Value as XmlValue;

use super::{Fault, PayloadCodec, Reply, Value};
use crate::error::{GbxError, Result};

/// XML-RPC implementation of [`PayloadCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlRpcCodec;

impl PayloadCodec for XmlRpcCodec {
    fn encode_call(&self, method: &str, params: &[Value]) -> Result<Vec<u8>> {
        let params = params
            .iter()
            .cloned()
            .map(to_xml)
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_xmlrpc::request_to_string(method, params)?.into_bytes())
    }

    fn decode_reply(&self, bytes: &[u8]) -> Result<Reply> {
        match serde_xmlrpc::response_from_str::<XmlValue>(utf8(bytes)?) {
            Ok(value) => Ok(Ok(from_xml(value))),
            Err(serde_xmlrpc::Error::Fault(fault)) => {
                Ok(Err(Fault::new(fault.fault_code, fault.fault_string)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn decode_call(&self, bytes: &[u8]) -> Result<(String, Vec<Value>)> {
        let (method, params) = serde_xmlrpc::request_from_str(utf8(bytes)?)?;
        Ok((method, params.into_iter().map(from_xml).collect()))
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| GbxError::Protocol(format!("XML-RPC payload is not UTF-8: {}", e)))
}

fn to_xml(value: Value) -> Result<XmlValue> {
    Ok(match value {
        Value::Nil => XmlValue::Nil,
        Value::Bool(b) => XmlValue::Bool(b),
        Value::Int(n) => match i32::try_from(n) {
            Ok(n) => XmlValue::Int(n),
            Err(_) => XmlValue::Int64(n),
        },
        Value::Double(d) => XmlValue::Double(d),
        Value::String(s) => XmlValue::String(s),
        Value::Base64(bytes) => XmlValue::Base64(bytes),
        // Parsed through the crate so the timestamp is validated the same
        // way as on decode.
        Value::DateTime(text) => {
            if text.contains(['<', '&']) {
                return Err(GbxError::UnexpectedValue(format!(
                    "invalid dateTime.iso8601 {:?}",
                    text
                )));
            }
            serde_xmlrpc::value_from_str(&format!(
                "<value><dateTime.iso8601>{}</dateTime.iso8601></value>",
                text
            ))?
        }
        Value::Array(items) => {
            XmlValue::Array(items.into_iter().map(to_xml).collect::<Result<_>>()?)
        }
        Value::Struct(members) => XmlValue::Struct(
            members
                .into_iter()
                .map(|(name, value)| Ok((name, to_xml(value)?)))
                .collect::<Result<_>>()?,
        ),
    })
}

fn from_xml(value: XmlValue) -> Value {
    match value {
        XmlValue::Nil => Value::Nil,
        XmlValue::Bool(b) => Value::Bool(b),
        XmlValue::Int(n) => Value::Int(n.into()),
        XmlValue::Int64(n) => Value::Int(n),
        XmlValue::Double(d) => Value::Double(d),
        XmlValue::String(s) => Value::String(s),
        XmlValue::Base64(bytes) => Value::Base64(bytes),
        XmlValue::DateTime(dt) => Value::DateTime(dt.to_string()),
        XmlValue::Array(items) => Value::Array(items.into_iter().map(from_xml).collect()),
        XmlValue::Struct(members) => Value::Struct(
            members
                .into_iter()
                .map(|(name, value)| (name, from_xml(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value_xml: &str) -> Vec<u8> {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <methodResponse><params><param><value>{}</value></param></params></methodResponse>",
            value_xml
        )
        .into_bytes()
    }

    #[test]
    fn test_decode_fault_response() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
            <methodResponse><fault><value><struct>\
            <member><name>faultCode</name><value><int>-1000</int></value></member>\
            <member><name>faultString</name><value><string>Permission denied.</string></value></member>\
            </struct></value></fault></methodResponse>";

        let reply = XmlRpcCodec.decode_reply(bytes).unwrap();
        assert_eq!(reply, Err(Fault::new(-1000, "Permission denied.")));
    }

    #[test]
    fn test_decode_struct_response() {
        let bytes = response(
            "<struct>\
             <member><name>Name</name><value><string>TmForever</string></value></member>\
             <member><name>Build</name><value><i4>2011</i4></value></member>\
             <member><name>Enabled</name><value><boolean>1</boolean></value></member>\
             <member><name>Tags</name><value><array><data>\
             <value><string>a</string></value><value><string>b</string></value>\
             </data></array></value></member>\
             </struct>",
        );

        let value = XmlRpcCodec.decode_reply(&bytes).unwrap().unwrap();
        let members = value.as_struct().unwrap();
        assert_eq!(members["Name"], Value::from("TmForever"));
        assert_eq!(members["Build"], Value::from(2011));
        assert_eq!(members["Enabled"], Value::from(true));
        assert_eq!(members["Tags"], Value::from(vec!["a", "b"]));
    }

    #[test]
    fn test_decode_method_signature_response() {
        let bytes = response(
            "<array><data><value><array><data>\
             <value><string>boolean</string></value><value><string>string</string></value>\
             </data></array></value></data></array>",
        );

        let value = XmlRpcCodec.decode_reply(&bytes).unwrap().unwrap();
        assert_eq!(value, Value::from(vec![vec!["boolean", "string"]]));
    }

    #[test]
    fn test_decode_callback() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
            <methodCall><methodName>TrackMania.PlayerChat</methodName><params>\
            <param><value><i4>0</i4></value></param>\
            <param><value><string>hi</string></value></param>\
            </params></methodCall>";

        let (method, params) = XmlRpcCodec.decode_call(bytes).unwrap();
        assert_eq!(method, "TrackMania.PlayerChat");
        assert_eq!(params, vec![Value::from(0), Value::from("hi")]);
    }

    #[test]
    fn test_encode_call() {
        let params = [Value::from("SuperAdmin"), Value::from(5_000_000_000i64)];
        let bytes = XmlRpcCodec.encode_call("Authenticate", &params).unwrap();

        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("<methodName>Authenticate</methodName>"));

        let (method, decoded) = XmlRpcCodec.decode_call(&bytes).unwrap();
        assert_eq!(method, "Authenticate");
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_reject_non_utf8() {
        let err = XmlRpcCodec.decode_reply(b"\xff\xfe").unwrap_err();
        assert!(err.to_string().contains("not UTF-8"));
    }

    #[test]
    fn test_reject_malformed_document() {
        let err = XmlRpcCodec.decode_reply(b"<methodResponse>").unwrap_err();
        assert!(matches!(err, GbxError::XmlRpc(_)));
    }

    #[test]
    fn test_reject_markup_in_datetime() {
        let err = XmlRpcCodec
            .encode_call("SetTime", &[Value::DateTime("<x/>".to_string())])
            .unwrap_err();
        assert!(matches!(err, GbxError::UnexpectedValue(_)));
    }
}
