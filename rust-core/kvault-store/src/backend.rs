// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core store contract for KVault.
//
// Defines the `Store` trait that the memory and disk backends implement and
// that `SerializedStore` decorates. Operations are synchronous and blocking;
// callers that need an asynchronous surface wrap them themselves. Stores are
// expected to be thread-safe (`Send + Sync`).

use crate::error::{Result, StorageError};

/// A value crossing the store boundary.
///
/// Backends store bytes, so they accept [`StoredValue::Bytes`] and
/// [`StoredValue::Text`] and always hand back `Bytes`. `Structured` values
/// only appear above a [`crate::serialized::SerializedStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// Raw byte sequence.
    Bytes(Vec<u8>),
    /// UTF-8 text, stored as its bytes.
    Text(String),
    /// A decoded, JSON-representable value.
    Structured(serde_json::Value),
}

impl StoredValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StoredValue::Bytes(_) => "bytes",
            StoredValue::Text(_) => "text",
            StoredValue::Structured(_) => "structured",
        }
    }

    /// Convert into the byte form a backend persists.
    ///
    /// `backend` names the caller for the `UnsupportedValueType` error raised
    /// on structured values.
    pub fn into_bytes(self, backend: &'static str) -> Result<Vec<u8>> {
        match self {
            StoredValue::Bytes(bytes) => Ok(bytes),
            StoredValue::Text(text) => Ok(text.into_bytes()),
            StoredValue::Structured(_) => Err(StorageError::UnsupportedValueType {
                backend,
                kind: "structured",
            }),
        }
    }

    /// Borrow the raw bytes of a `Bytes` or `Text` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StoredValue::Bytes(bytes) => Some(bytes),
            StoredValue::Text(text) => Some(text.as_bytes()),
            StoredValue::Structured(_) => None,
        }
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(bytes: Vec<u8>) -> Self {
        StoredValue::Bytes(bytes)
    }
}

impl From<&[u8]> for StoredValue {
    fn from(bytes: &[u8]) -> Self {
        StoredValue::Bytes(bytes.to_vec())
    }
}

impl From<String> for StoredValue {
    fn from(text: String) -> Self {
        StoredValue::Text(text)
    }
}

impl From<&str> for StoredValue {
    fn from(text: &str) -> Self {
        StoredValue::Text(text.to_string())
    }
}

impl From<serde_json::Value> for StoredValue {
    fn from(value: serde_json::Value) -> Self {
        StoredValue::Structured(value)
    }
}

/// A key/value pair produced by [`Store::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<V = StoredValue> {
    /// The entry's key.
    pub key: String,
    /// The entry's value.
    pub value: V,
}

impl<V> Entry<V> {
    /// Build an entry from its parts.
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Normalize a `list` limit: anything `<= 0` means unbounded.
pub fn list_limit(limit: i64) -> Option<usize> {
    if limit > 0 {
        Some(usize::try_from(limit).unwrap_or(usize::MAX))
    } else {
        None
    }
}

/// A pluggable key-value store.
///
/// Keys are non-empty text. The most recent `set` for a key is the only value
/// visible to later `get`, `list` and `exists` calls until the next `set` or
/// `delete`. Every mutation is visible to the next operation on the same
/// handle.
pub trait Store: Send + Sync {
    /// Retrieve the value stored under `key`.
    ///
    /// Fails with [`StorageError::NotFound`] if the key is absent.
    fn get(&self, key: &str) -> Result<StoredValue>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: StoredValue) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Check whether `key` is present.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Remove every key.
    fn clear(&self) -> Result<()>;

    /// Number of live keys.
    fn size(&self) -> Result<u64>;

    /// Entries whose key starts with `prefix`, in ascending key order.
    ///
    /// An empty prefix matches every key. A `limit` of zero or less means
    /// no limit; otherwise at most `limit` entries are returned.
    fn list(&self, prefix: &str, limit: i64) -> Result<Vec<Entry>>;

    /// Release backend resources. Safe to call more than once.
    fn close(&self) -> Result<()>;

    /// Drop every reference this handle holds on backend resources.
    ///
    /// Reference-counted backends close once per `close`; this releases them
    /// fully, however many operations ran. Defaults to a single `close`.
    fn release(&self) -> Result<()> {
        self.close()
    }

    /// A human-readable name for this store, used in logging.
    fn name(&self) -> &str;
}
