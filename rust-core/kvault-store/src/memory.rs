// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory storage backend for KVault.
//
// Uses a `HashMap` wrapped in a `RwLock`. The map has no intrinsic order, so
// `list` sorts the matching keys before materializing entries. All data lives
// in process memory and is lost on drop.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::backend::{list_limit, Entry, Store, StoredValue};
use crate::error::{Result, StorageError};

/// A volatile, process-local store.
///
/// Readers share the lock; `set`, `delete` and `clear` take it exclusively.
/// Cloning the handle shares the same container.
///
/// # Example
///
/// ```rust
/// use kvault_store::{MemoryStore, Store, StoredValue};
///
/// let store = MemoryStore::new();
/// store.set("hello", "world".into()).unwrap();
/// assert_eq!(store.get("hello").unwrap(), StoredValue::Bytes(b"world".to_vec()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    container: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<StoredValue> {
        let map = self.container.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key)
            .map(|value| StoredValue::Bytes(value.clone()))
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<()> {
        let bytes = value.into_bytes("memory")?;
        let mut map = self.container.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), bytes);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.container.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let map = self.container.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.contains_key(key))
    }

    fn clear(&self) -> Result<()> {
        let mut map = self.container.write().unwrap_or_else(PoisonError::into_inner);
        map.clear();
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        let map = self.container.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.len() as u64)
    }

    fn list(&self, prefix: &str, limit: i64) -> Result<Vec<Entry>> {
        let map = self.container.read().unwrap_or_else(PoisonError::into_inner);

        let mut keys: Vec<&String> = map
            .keys()
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort_unstable();
        if let Some(limit) = list_limit(limit) {
            keys.truncate(limit);
        }

        Ok(keys
            .into_iter()
            .map(|key| Entry::new(key.clone(), StoredValue::Bytes(map[key].clone())))
            .collect())
    }

    fn close(&self) -> Result<()> {
        // Nothing to release.
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
