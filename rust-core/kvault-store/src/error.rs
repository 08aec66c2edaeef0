// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage error types for the KVault store core.
//
// One enum covers every failure a store, a serializer or the option layer can
// report. Backends wrap engine failures with the operation (and key, where one
// is involved) so callers can tell which call failed without a backtrace.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key was not found.
    #[error("key {0} not found")]
    NotFound(String),

    /// An operation was attempted on a store that was never opened.
    #[error("store not open: {0}")]
    Unopened(String),

    /// A backend was handed a value it cannot store as bytes.
    #[error("unsupported value type for {backend} store: {kind}")]
    UnsupportedValueType {
        /// Backend that rejected the value.
        backend: &'static str,
        /// Kind of the rejected value.
        kind: &'static str,
    },

    /// The namespace table is missing after the store was opened.
    #[error("bucket {0} not found")]
    BucketMissing(String),

    /// The underlying engine failed (transaction, commit, file handle).
    #[error("backend error: {0}")]
    Backend(String),

    /// An I/O error occurred while preparing the database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The active serializer failed to encode or decode a value.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend or serialization selection could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    /// Return true if this error reports an absent key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
