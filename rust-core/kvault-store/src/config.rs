// SPDX-License-Identifier: PMPL-1.0-or-later
//! Store selection options.
//!
//! Defaults: backend `disk` at `.k6.kv`, serialization `json`. Backend and
//! serialization names are validated before any store is constructed.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::Store;
use crate::disk::{DiskStore, DEFAULT_DISK_STORE_PATH};
use crate::error::{Result, StorageError};
use crate::memory::MemoryStore;
use crate::serialized::SerializedStore;
use crate::serializer::{JsonSerializer, Serializer, StringSerializer};

/// Which backend holds the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Volatile process-local map.
    Memory,
    /// redb database file.
    #[default]
    Disk,
}

impl BackendKind {
    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Disk => "disk",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(BackendKind::Memory),
            "disk" => Ok(BackendKind::Disk),
            other => Err(StorageError::InvalidConfig(format!(
                "invalid backend: {other}, valid values are: memory, disk"
            ))),
        }
    }
}

/// How application values are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationKind {
    /// Structured values through JSON.
    #[default]
    Json,
    /// Values stored as their text.
    String,
}

impl SerializationKind {
    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            SerializationKind::Json => "json",
            SerializationKind::String => "string",
        }
    }

    /// Build the serializer for this encoding.
    pub fn serializer(self) -> Arc<dyn Serializer> {
        match self {
            SerializationKind::Json => Arc::new(JsonSerializer::new()),
            SerializationKind::String => Arc::new(StringSerializer::new()),
        }
    }
}

impl fmt::Display for SerializationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerializationKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(SerializationKind::Json),
            "string" => Ok(SerializationKind::String),
            other => Err(StorageError::InvalidConfig(format!(
                "invalid serialization: {other}, valid values are: json, string"
            ))),
        }
    }
}

/// Options for building a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Backend holding the data.
    pub backend: BackendKind,
    /// Encoding of stored values.
    pub serialization: SerializationKind,
    /// Database file for the disk backend; [`DEFAULT_DISK_STORE_PATH`] when unset.
    pub path: Option<PathBuf>,
}

impl StoreOptions {
    /// Parse options from backend and serialization names.
    ///
    /// `None` selects the default for that field.
    pub fn parse(backend: Option<&str>, serialization: Option<&str>) -> Result<Self> {
        Ok(Self {
            backend: backend.map(str::parse).transpose()?.unwrap_or_default(),
            serialization: serialization.map(str::parse).transpose()?.unwrap_or_default(),
            path: None,
        })
    }

    /// Parse options from a JSON document such as
    /// `{"backend": "memory", "serialization": "string"}`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StorageError::InvalidConfig(format!("unable to parse options: {e}")))
    }

    /// Use `backend`.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Use `serialization`.
    pub fn with_serialization(mut self, serialization: SerializationKind) -> Self {
        self.serialization = serialization;
        self
    }

    /// Store the disk backend's data at `path`.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Construct the backend these options select.
    pub fn backend_store(&self) -> Arc<dyn Store> {
        match self.backend {
            BackendKind::Memory => Arc::new(MemoryStore::new()),
            BackendKind::Disk => Arc::new(DiskStore::with_path(
                self.path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DISK_STORE_PATH)),
            )),
        }
    }

    /// Construct the serialized store these options describe.
    ///
    /// Nothing is opened yet; the disk backend opens on first use.
    pub fn build(&self) -> SerializedStore {
        debug!(
            backend = %self.backend,
            serialization = %self.serialization,
            "building store"
        );
        SerializedStore::new(self.backend_store(), self.serialization.serializer())
    }
}
