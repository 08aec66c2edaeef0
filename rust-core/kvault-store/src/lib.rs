// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// KVault Storage Core
//
// This crate provides a pluggable key-value store with two interchangeable
// backends, a serializer layer that decouples stored bytes from application
// values, and a reference-counted lifecycle for the disk backend so that
// many callers can share one database file.
//
// # Modules
//
// - [`backend`] -- The `Store` trait, `StoredValue` and `Entry`.
// - [`error`] -- The `StorageError` enum covering all failure modes.
// - [`memory`] -- A volatile `HashMap` store behind a read/write lock.
// - [`disk`] -- A redb-backed store with reference-counted open/close.
// - [`serializer`] -- JSON and raw-text serializers.
// - [`serialized`] -- The `SerializedStore` decorator.
// - [`config`] -- Backend and serialization selection.
// - [`registry`] -- An explicitly owned, shared store handle.
//
// # Example
//
// ```rust
// use std::sync::Arc;
// use kvault_store::{JsonSerializer, MemoryStore, SerializedStore, Store};
//
// let store = SerializedStore::new(Arc::new(MemoryStore::new()), Arc::new(JsonSerializer::new()));
// store.set_value("a", &serde_json::json!(1)).unwrap();
// store.set_value("b", &serde_json::json!(2)).unwrap();
//
// let keys: Vec<String> = store.list_values("", 0).unwrap().into_iter().map(|e| e.key).collect();
// assert_eq!(keys, ["a", "b"]);
// assert_eq!(store.size().unwrap(), 2);
// ```

pub mod backend;
pub mod config;
pub mod disk;
pub mod error;
pub mod memory;
pub mod registry;
pub mod serialized;
pub mod serializer;

// Re-export the most commonly used types at the crate root for convenience.
pub use backend::{Entry, Store, StoredValue};
pub use config::{BackendKind, SerializationKind, StoreOptions};
pub use disk::{DiskStore, DEFAULT_BUCKET, DEFAULT_DISK_STORE_PATH};
pub use error::{Result, StorageError};
pub use memory::MemoryStore;
pub use registry::StoreRegistry;
pub use serialized::SerializedStore;
pub use serializer::{JsonSerializer, Serializer, StringSerializer};
