// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Value serializers for KVault.
//
// A serializer turns an application value (`serde_json::Value`) into the bytes
// a backend stores, and back. Serializers are stateless and shareable.

use serde_json::Value;

use crate::error::{Result, StorageError};

/// Encode/decode strategy between application values and stored bytes.
pub trait Serializer: Send + Sync + std::fmt::Debug {
    /// Encode `value` into bytes.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>>;

    /// Decode bytes produced by [`Serializer::serialize`].
    fn deserialize(&self, data: &[u8]) -> Result<Value>;

    /// Short name of the encoding (`"json"`, `"string"`).
    fn name(&self) -> &str;
}

/// Structured serializer: values round-trip through JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact JSON output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented JSON output. Decoding is unaffected.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        encoded.map_err(|e| {
            StorageError::Serialization(format!("unable to serialize value to JSON: {e}"))
        })
    }

    fn deserialize(&self, data: &[u8]) -> Result<Value> {
        // A stored empty value decodes to null; absent keys are reported by
        // the store, not here.
        if data.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(data).map_err(|e| {
            StorageError::Serialization(format!("unable to deserialize JSON value: {e}"))
        })
    }

    fn name(&self) -> &str {
        "json"
    }
}

/// Raw-text serializer: values are stored as their text.
///
/// Strings are stored verbatim; any other value is stored as its JSON text.
/// Decoding never fails and always yields a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl StringSerializer {
    /// Create a raw-text serializer.
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for StringSerializer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::String(text) => Ok(text.as_bytes().to_vec()),
            other => Ok(other.to_string().into_bytes()),
        }
    }

    fn deserialize(&self, data: &[u8]) -> Result<Value> {
        Ok(Value::String(String::from_utf8_lossy(data).into_owned()))
    }

    fn name(&self) -> &str {
        "string"
    }
}
