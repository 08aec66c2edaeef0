// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Serializing store decorator for KVault.
//
// Wraps any `Store` and translates between the bytes a backend keeps and the
// application's values, using a serializer that can be swapped at runtime.
// Swapping never re-encodes data already stored: bytes written under one
// serializer and read under another are decoded by the new one, and that
// mismatch is not detected.

use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::backend::{Entry, Store, StoredValue};
use crate::error::{Result, StorageError};
use crate::serializer::Serializer;

/// A decorator adding serialization to a backend store.
///
/// `get` and `list` decode `Bytes`/`Text` from the backend with the active
/// serializer and pass `Structured` values through. `set` always encodes.
/// Every other operation is forwarded unchanged.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kvault_store::{JsonSerializer, MemoryStore, SerializedStore};
///
/// let store = SerializedStore::new(Arc::new(MemoryStore::new()), Arc::new(JsonSerializer::new()));
/// store.set_value("user", &serde_json::json!({"name": "Alice"})).unwrap();
///
/// let user = store.get_value("user").unwrap();
/// assert_eq!(user["name"], "Alice");
/// ```
pub struct SerializedStore {
    /// The backend holding the encoded bytes. Fixed for the store's life.
    backend: Arc<dyn Store>,
    /// The active serializer.
    serializer: RwLock<Arc<dyn Serializer>>,
}

/// Re-tag a serializer failure with the key it concerned.
fn with_key(action: &str, key: &str) -> impl FnOnce(StorageError) -> StorageError {
    let context = format!("failed to {action} value for key {key}");
    move |err| match err {
        StorageError::Serialization(msg) => StorageError::Serialization(format!("{context}: {msg}")),
        other => other,
    }
}

/// Lift a backend-level value to an application value for encoding.
fn to_json(value: StoredValue) -> Value {
    match value {
        StoredValue::Structured(value) => value,
        StoredValue::Text(text) => Value::String(text),
        StoredValue::Bytes(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
    }
}

impl SerializedStore {
    /// Wrap `backend`, encoding values with `serializer`.
    pub fn new(backend: Arc<dyn Store>, serializer: Arc<dyn Serializer>) -> Self {
        Self {
            backend,
            serializer: RwLock::new(serializer),
        }
    }

    /// Return the underlying backend.
    pub fn backend(&self) -> &Arc<dyn Store> {
        &self.backend
    }

    /// Return the active serializer.
    pub fn serializer(&self) -> Arc<dyn Serializer> {
        let active = self.serializer.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*active)
    }

    /// Replace the serializer used by operations issued from now on.
    pub fn set_serializer(&self, serializer: Arc<dyn Serializer>) {
        let mut active = self.serializer.write().unwrap_or_else(PoisonError::into_inner);
        *active = serializer;
    }

    fn decode(serializer: &dyn Serializer, key: &str, raw: StoredValue) -> Result<Value> {
        match raw {
            StoredValue::Bytes(bytes) => serializer
                .deserialize(&bytes)
                .map_err(with_key("deserialize", key)),
            StoredValue::Text(text) => serializer
                .deserialize(text.as_bytes())
                .map_err(with_key("deserialize", key)),
            StoredValue::Structured(value) => Ok(value),
        }
    }

    /// Retrieve and decode the value stored under `key`.
    pub fn get_value(&self, key: &str) -> Result<Value> {
        let raw = self.backend.get(key)?;
        Self::decode(self.serializer().as_ref(), key, raw)
    }

    /// Encode `value` and store it under `key`.
    pub fn set_value(&self, key: &str, value: &Value) -> Result<()> {
        let bytes = self
            .serializer()
            .serialize(value)
            .map_err(with_key("serialize", key))?;
        self.backend.set(key, StoredValue::Bytes(bytes))
    }

    /// List and decode entries whose key starts with `prefix`.
    pub fn list_values(&self, prefix: &str, limit: i64) -> Result<Vec<Entry<Value>>> {
        let raw_entries = self.backend.list(prefix, limit)?;
        let serializer = self.serializer();

        raw_entries
            .into_iter()
            .map(|entry| -> Result<Entry<Value>> {
                let value = Self::decode(serializer.as_ref(), &entry.key, entry.value)?;
                Ok(Entry::new(entry.key, value))
            })
            .collect()
    }

    /// Retrieve `key` and convert it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get_value(key)?;
        serde_json::from_value(value).map_err(|e| {
            StorageError::Serialization(format!("failed to convert value for key {key}: {e}"))
        })
    }

    /// Convert `value` and store it under `key`.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| {
            StorageError::Serialization(format!("failed to convert value for key {key}: {e}"))
        })?;
        self.set_value(key, &value)
    }
}

impl std::fmt::Debug for SerializedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedStore")
            .field("backend", &self.backend.name())
            .field("serializer", &self.serializer().name())
            .finish()
    }
}

impl Store for SerializedStore {
    fn get(&self, key: &str) -> Result<StoredValue> {
        self.get_value(key).map(StoredValue::Structured)
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<()> {
        self.set_value(key, &to_json(value))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.backend.exists(key)
    }

    fn clear(&self) -> Result<()> {
        self.backend.clear()
    }

    fn size(&self) -> Result<u64> {
        self.backend.size()
    }

    fn list(&self, prefix: &str, limit: i64) -> Result<Vec<Entry>> {
        Ok(self
            .list_values(prefix, limit)?
            .into_iter()
            .map(|entry| Entry::new(entry.key, StoredValue::Structured(entry.value)))
            .collect())
    }

    fn close(&self) -> Result<()> {
        self.backend.close()
    }

    fn release(&self) -> Result<()> {
        self.backend.release()
    }

    fn name(&self) -> &str {
        self.backend.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::serializer::{JsonSerializer, StringSerializer};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestRecord {
        name: String,
        score: f64,
    }

    fn json_store() -> (SerializedStore, MemoryStore) {
        let backend = MemoryStore::new();
        let store = SerializedStore::new(Arc::new(backend.clone()), Arc::new(JsonSerializer::new()));
        (store, backend)
    }

    #[test]
    fn test_value_round_trip() {
        let (store, backend) = json_store();

        store.set_value("obj", &json!({"a": [1, 2, 3]})).unwrap();
        assert_eq!(store.get_value("obj").unwrap(), json!({"a": [1, 2, 3]}));

        // The backend only ever sees bytes.
        assert_eq!(
            backend.get("obj").unwrap(),
            StoredValue::Bytes(br#"{"a":[1,2,3]}"#.to_vec())
        );
    }

    #[test]
    fn test_typed_round_trip() {
        let (store, _) = json_store();
        let record = TestRecord {
            name: "Alice".to_string(),
            score: 95.5,
        };

        store.set_as("rec1", &record).unwrap();
        assert_eq!(store.get_as::<TestRecord>("rec1").unwrap(), record);

        store.set_as("int", &42i64).unwrap();
        assert_eq!(store.get_as::<i64>("int").unwrap(), 42);
        assert!(store.get_as::<TestRecord>("int").is_err());
    }

    #[test]
    fn test_missing_key_passes_through() {
        let (store, _) = json_store();
        assert!(store.get_value("nope").unwrap_err().is_not_found());
        assert!(store.get("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_store_trait_set_variants() {
        let (store, backend) = json_store();

        store.set("text", StoredValue::from("hi")).unwrap();
        assert_eq!(backend.get("text").unwrap(), StoredValue::Bytes(b"\"hi\"".to_vec()));
        assert_eq!(store.get("text").unwrap(), StoredValue::Structured(json!("hi")));

        store.set("bytes", StoredValue::from(vec![1u8, 2])).unwrap();
        assert_eq!(store.get("bytes").unwrap(), StoredValue::Structured(json!([1, 2])));

        store.set("obj", json!({"k": null}).into()).unwrap();
        assert_eq!(store.get("obj").unwrap(), StoredValue::Structured(json!({"k": null})));
    }

    #[test]
    fn test_list_decodes_in_order() {
        let (store, _) = json_store();
        store.set_value("b", &json!(2)).unwrap();
        store.set_value("a", &json!(1)).unwrap();
        store.set_value("c", &json!("three")).unwrap();

        let entries = store.list_values("", 0).unwrap();
        assert_eq!(
            entries,
            vec![
                Entry::new("a", json!(1)),
                Entry::new("b", json!(2)),
                Entry::new("c", json!("three")),
            ]
        );

        let limited = store.list("", 2).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[1].value, StoredValue::Structured(json!(2)));
    }

    #[test]
    fn test_decode_error_names_key() {
        let (store, backend) = json_store();
        backend.set("broken", "not-valid-json!!!".into()).unwrap();

        match store.get_value("broken").unwrap_err() {
            StorageError::Serialization(msg) => {
                assert!(msg.contains("failed to deserialize value for key broken"));
            }
            other => panic!("expected Serialization, got: {:?}", other),
        }

        match store.list_values("", 0).unwrap_err() {
            StorageError::Serialization(msg) => assert!(msg.contains("broken")),
            other => panic!("expected Serialization, got: {:?}", other),
        }
    }

    #[test]
    fn test_stored_empty_value_decodes_to_null() {
        let (store, backend) = json_store();
        backend.set("empty", StoredValue::Bytes(Vec::new())).unwrap();
        assert_eq!(store.get_value("empty").unwrap(), Value::Null);
    }

    #[test]
    fn test_serializer_swap_affects_later_operations_only() {
        let (store, backend) = json_store();
        assert_eq!(store.serializer().name(), "json");

        store.set_value("n", &json!(5)).unwrap();
        store.set_serializer(Arc::new(StringSerializer::new()));
        assert_eq!(store.serializer().name(), "string");

        // Old bytes are read back through the new serializer as text.
        assert_eq!(store.get_value("n").unwrap(), json!("5"));

        store.set_value("s", &json!("plain")).unwrap();
        assert_eq!(backend.get("s").unwrap(), StoredValue::Bytes(b"plain".to_vec()));

        // Swapping back: raw text is not valid JSON.
        store.set_serializer(Arc::new(JsonSerializer::new()));
        assert!(store.get_value("s").is_err());
    }

    #[test]
    fn test_pass_through_operations() {
        let (store, backend) = json_store();
        store.set_value("a", &json!(1)).unwrap();
        store.set_value("b", &json!(2)).unwrap();

        assert!(store.exists("a").unwrap());
        assert_eq!(store.size().unwrap(), 2);

        store.delete("a").unwrap();
        assert!(!store.exists("a").unwrap());
        assert!(!backend.exists("a").unwrap());

        store.clear().unwrap();
        assert_eq!(backend.size().unwrap(), 0);

        store.close().unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_release_drains_disk_backend() {
        let dir = tempfile::tempdir().unwrap();
        let disk = Arc::new(crate::disk::DiskStore::with_path(dir.path().join("s.kv")));
        let store = SerializedStore::new(disk.clone(), Arc::new(JsonSerializer::new()));

        store.set_value("k", &json!(1)).unwrap();
        store.get_value("k").unwrap();
        assert_eq!(disk.ref_count(), 2);

        store.release().unwrap();
        assert_eq!(disk.ref_count(), 0);
        assert!(!disk.is_open());
    }
}
