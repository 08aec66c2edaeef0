// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared store registry for KVault.
//
// Many logical callers reuse one store. Instead of a global, the registry is
// an ordinary value the embedder creates once and shares; the first `open`
// builds the store and every later `open` hands back the same instance.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::backend::Store;
use crate::config::StoreOptions;
use crate::error::{Result, StorageError};
use crate::serialized::SerializedStore;

/// Owner of the one store shared between callers.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    store: Mutex<Option<Arc<SerializedStore>>>,
}

impl StoreRegistry {
    /// Create an empty registry. No store exists until [`StoreRegistry::open`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared store, building it from `options` on first call.
    ///
    /// Options passed after the store exists are ignored; the backend is
    /// fixed for the life of the store.
    pub fn open(&self, options: &StoreOptions) -> Arc<SerializedStore> {
        let mut slot = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = slot.as_ref() {
            let active_serializer = store.serializer();
            if store.backend().name() != options.backend.as_str()
                || active_serializer.name() != options.serialization.as_str()
            {
                warn!(
                    requested_backend = %options.backend,
                    requested_serialization = %options.serialization,
                    active_backend = store.backend().name(),
                    active_serialization = active_serializer.name(),
                    "store already open, ignoring requested options"
                );
            }
            return Arc::clone(store);
        }

        let store = Arc::new(options.build());
        info!(
            backend = %options.backend,
            serialization = %options.serialization,
            "opened shared store"
        );
        *slot = Some(Arc::clone(&store));
        store
    }

    /// Return the shared store, or `Unopened` if `open` was never called.
    pub fn current(&self) -> Result<Arc<SerializedStore>> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| StorageError::Unopened("no store has been opened yet".to_string()))
    }

    /// Whether a store has been opened.
    pub fn is_open(&self) -> bool {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Release the shared store and forget it.
    ///
    /// Every reference the store holds on its backend is dropped, so the disk
    /// file is unlocked and the next `open` can build a new store over it.
    /// Handles already given out reopen the backend if used again. Closing an
    /// empty registry is a no-op.
    pub fn close(&self) -> Result<()> {
        let store = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match store {
            Some(store) => {
                debug!(backend = store.backend().name(), "releasing shared store");
                store.release()
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, SerializationKind};
    use serde_json::json;

    fn memory_options() -> StoreOptions {
        StoreOptions::default().with_backend(BackendKind::Memory)
    }

    #[test]
    fn test_current_before_open_is_unopened() {
        let registry = StoreRegistry::new();
        assert!(!registry.is_open());
        assert!(matches!(registry.current(), Err(StorageError::Unopened(_))));
    }

    #[test]
    fn test_open_returns_shared_instance() {
        let registry = StoreRegistry::new();
        let first = registry.open(&memory_options());
        let second = registry.open(&memory_options().with_serialization(SerializationKind::String));

        assert!(Arc::ptr_eq(&first, &second));
        // The first options win.
        assert_eq!(second.serializer().name(), "json");

        first.set_value("k", &json!(1)).unwrap();
        assert_eq!(registry.current().unwrap().get_value("k").unwrap(), json!(1));
    }

    #[test]
    fn test_close_forgets_store() {
        let registry = StoreRegistry::new();
        let store = registry.open(&memory_options());
        store.set_value("k", &json!(1)).unwrap();

        registry.close().unwrap();
        assert!(!registry.is_open());
        registry.close().unwrap();

        // A fresh memory store is built on the next open.
        let reopened = registry.open(&memory_options());
        assert!(!Arc::ptr_eq(&store, &reopened));
        assert!(!reopened.exists("k").unwrap());
    }

    #[test]
    fn test_close_unlocks_disk_file_for_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions::default().with_path(dir.path().join("registry.kv"));
        let registry = StoreRegistry::new();

        let store = registry.open(&options);
        store.set_value("k", &json!(1)).unwrap();
        assert_eq!(store.get_value("k").unwrap(), json!(1));

        registry.close().unwrap();

        let reopened = registry.open(&options);
        assert!(!Arc::ptr_eq(&store, &reopened));
        assert_eq!(reopened.get_value("k").unwrap(), json!(1));
        registry.close().unwrap();
    }

    #[test]
    fn test_shared_across_threads() {
        let registry = StoreRegistry::new();
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let registry = &registry;
                scope.spawn(move || {
                    let store = registry.open(&memory_options());
                    store.set_value(&format!("w{worker}"), &json!(worker)).unwrap();
                });
            }
        });
        assert_eq!(registry.current().unwrap().size().unwrap(), 4);
    }
}
