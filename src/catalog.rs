//! Method catalog built from the server's introspection methods.
//!
//! [`MethodCatalog::populate`] calls `system.listMethods`, then
//! `system.methodSignature` and `system.methodHelp` for every name, and
//! keeps one [`MethodDescriptor`] per reported signature.
//!
//! Population tolerates partial failure: a method whose signature or help
//! query faults, or whose signature reply is malformed, is skipped. Transport
//! errors still abort population.
//!
//! # Example
//!
//! ```ignore
//! let catalog = MethodCatalog::populate(&mut dispatcher).await?;
//! for descriptor in catalog.lookup("GetVersion") {
//!     println!("{}", descriptor);
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{PayloadCodec, Value};
use crate::dispatch::Dispatcher;
use crate::error::{GbxError, Result};

/// Lists every method the server exposes.
pub const LIST_METHODS: &str = "system.listMethods";

/// Returns the signatures of one method.
pub const METHOD_SIGNATURE: &str = "system.methodSignature";

/// Returns the help text of one method.
pub const METHOD_HELP: &str = "system.methodHelp";

/// One signature of one method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
    /// Method name.
    pub name: String,
    /// Declared return type.
    pub return_type: String,
    /// Declared parameter types, in order.
    pub param_types: Vec<String>,
    /// Help text, shared by all signatures of the method.
    pub help: String,
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> {}",
            self.name,
            self.param_types.join(", "),
            self.return_type
        )
    }
}

/// Immutable registry of the server's RPC surface.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct MethodCatalog {
    methods: BTreeMap<String, Vec<MethodDescriptor>>,
}

impl MethodCatalog {
    /// Query the introspection methods and build the catalog.
    ///
    /// A fault on `system.listMethods` is returned as [`GbxError::Fault`];
    /// a reply that is not a list of names as [`GbxError::UnexpectedValue`].
    pub async fn populate<S, C>(dispatcher: &mut Dispatcher<S, C>) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        C: PayloadCodec,
    {
        let names = parse_method_names(dispatcher.query(LIST_METHODS, &[]).await??)?;
        tracing::debug!("Server lists {} methods", names.len());

        let mut methods = BTreeMap::new();
        for name in names {
            let arg = [Value::from(name.as_str())];

            let signatures = match dispatcher.query(METHOD_SIGNATURE, &arg).await? {
                Ok(value) => value,
                Err(fault) => {
                    tracing::warn!("Skipping {}: signature query failed: {}", name, fault);
                    continue;
                }
            };
            let help = match dispatcher.query(METHOD_HELP, &arg).await? {
                Ok(value) => value,
                Err(fault) => {
                    tracing::warn!("Skipping {}: help query failed: {}", name, fault);
                    continue;
                }
            };

            let descriptors = match build_descriptors(&name, &signatures, &help) {
                Ok(descriptors) => descriptors,
                Err(reason) => {
                    tracing::warn!("Skipping {}: {}", name, reason);
                    continue;
                }
            };
            for descriptor in &descriptors {
                tracing::debug!("{} - {}", descriptor, descriptor.help);
            }
            methods.insert(name, descriptors);
        }

        Ok(Self { methods })
    }

    /// Build a catalog from descriptors gathered elsewhere.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = MethodDescriptor>) -> Self {
        let mut methods: BTreeMap<String, Vec<MethodDescriptor>> = BTreeMap::new();
        for descriptor in descriptors {
            methods
                .entry(descriptor.name.clone())
                .or_default()
                .push(descriptor);
        }
        Self { methods }
    }

    /// Descriptors for `name`; empty if the method is unknown.
    pub fn lookup(&self, name: &str) -> &[MethodDescriptor] {
        self.methods.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `name` was listed by the server.
    ///
    /// True even for methods that report no signature information.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Method names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// All descriptors, grouped by method name in sorted order.
    pub fn descriptors(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values().flatten()
    }

    /// Number of cataloged methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Pretty JSON dump: `{ name: [descriptor, ...] }`.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn parse_method_names(value: Value) -> Result<Vec<String>> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(GbxError::UnexpectedValue(format!(
                "{} returned {}, expected array",
                LIST_METHODS,
                other.type_name()
            )))
        }
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(name),
            other => Err(GbxError::UnexpectedValue(format!(
                "{} returned a {} entry, expected string",
                LIST_METHODS,
                other.type_name()
            ))),
        })
        .collect()
}

/// Turn a `methodSignature` reply into descriptors.
///
/// A non-array reply means "no signature information" and yields nothing,
/// as does an empty inner signature.
fn build_descriptors(
    name: &str,
    signatures: &Value,
    help: &Value,
) -> std::result::Result<Vec<MethodDescriptor>, String> {
    let help = match help {
        Value::String(text) => text.clone(),
        Value::Nil => String::new(),
        other => return Err(format!("help is a {}, expected string", other.type_name())),
    };

    let Some(signatures) = signatures.as_array() else {
        return Ok(Vec::new());
    };

    let mut descriptors = Vec::with_capacity(signatures.len());
    for signature in signatures {
        let types = signature
            .as_array()
            .ok_or_else(|| format!("signature is a {}, expected array", signature.type_name()))?;
        let types = types
            .iter()
            .map(|t| {
                t.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("type is a {}, expected string", t.type_name()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let Some((return_type, param_types)) = types.split_first() else {
            continue;
        };
        descriptors.push(MethodDescriptor {
            name: name.to_string(),
            return_type: return_type.clone(),
            param_types: param_types.to_vec(),
            help: help.clone(),
        });
    }
    Ok(descriptors)
}
