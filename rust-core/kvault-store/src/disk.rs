// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>
//
// redb-backed persistent storage backend for KVault.
//
// Uses redb (pure Rust, B-tree, ACID, single-file database) to provide
// durable key-value storage. No C/C++ dependencies.
//
// # Design
//
// - Single redb `Database` file containing one table (the bucket).
// - The file is opened lazily and reference counted: every `open()` and
//   every data operation takes a reference, every `close()` releases one,
//   and the file handle is dropped when the count reaches zero.
// - Read transactions for all read operations (concurrent).
// - Write transactions for set/delete/clear (serialised by redb internally).
// - `list` uses redb's `range()` from the prefix and stops at the first key
//   that no longer matches, so results come back in ascending byte order.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition, TableError,
};
use tracing::{debug, trace};

use crate::backend::{list_limit, Entry, Store, StoredValue};
use crate::error::{Result, StorageError};

/// Default path of the database file, relative to the working directory.
pub const DEFAULT_DISK_STORE_PATH: &str = ".k6.kv";

/// Name of the table holding every key of a store.
pub const DEFAULT_BUCKET: &str = "k6";

const BUCKET_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new(DEFAULT_BUCKET);

/// Wrap an engine error with the operation that produced it.
fn engine<E: std::fmt::Display>(context: impl Into<String>) -> impl FnOnce(E) -> StorageError {
    let context = context.into();
    move |err| StorageError::Backend(format!("{context}: {err}"))
}

/// Open (or create) the database file at `path` with owner-only permissions
/// and make sure the bucket table exists.
fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let file = options.open(path)?;

    let db = Database::builder()
        .create_file(file)
        .map_err(engine(format!("failed to open database at {}", path.display())))?;

    let txn = db
        .begin_write()
        .map_err(engine("failed to create internal bucket"))?;
    txn.open_table(BUCKET_TABLE)
        .map_err(engine("failed to create internal bucket"))?;
    txn.commit()
        .map_err(engine("failed to create internal bucket"))?;

    Ok(db)
}

/// A persistent store powered by redb.
///
/// One `DiskStore` represents one database path. Share a single instance
/// (for example behind an `Arc`) between every caller that should use the
/// same file: reference counting happens per instance, and redb refuses a
/// second concurrent open of the same file.
///
/// # Reference counting
///
/// `open()` and each of `get`, `set`, `delete`, `exists`, `clear`, `size` and
/// `list` take one reference; `close()` releases one. The file handle stays
/// open while the count is positive and is dropped when it reaches zero. A
/// later operation transparently re-opens the file.
///
/// # Example
///
/// ```rust,no_run
/// use kvault_store::{DiskStore, Store};
///
/// let store = DiskStore::with_path("/tmp/kvault-example.kv");
/// store.set("hello", "world".into()).unwrap();
/// assert_eq!(store.ref_count(), 1);
/// store.close().unwrap();
/// assert!(!store.is_open());
/// ```
pub struct DiskStore {
    /// Path to the database file.
    path: PathBuf,
    /// The open database, present while `ref_count > 0`.
    handle: RwLock<Option<Arc<Database>>>,
    /// Fast-path flag mirroring `handle.is_some()`.
    opened: AtomicBool,
    /// Outstanding references against the handle.
    ref_count: AtomicI64,
    /// Serializes the open/close transitions.
    open_lock: Mutex<()>,
}

impl DiskStore {
    /// Create a store over [`DEFAULT_DISK_STORE_PATH`]. Nothing is opened yet.
    pub fn new() -> Self {
        Self::with_path(DEFAULT_DISK_STORE_PATH)
    }

    /// Create a store over the database file at `path`. Nothing is opened yet.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            handle: RwLock::new(None),
            opened: AtomicBool::new(false),
            ref_count: AtomicI64::new(0),
            open_lock: Mutex::new(()),
        }
    }

    /// Return the filesystem path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the name of the table holding this store's keys.
    pub fn bucket(&self) -> &str {
        DEFAULT_BUCKET
    }

    /// Number of outstanding references.
    pub fn ref_count(&self) -> i64 {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Whether the database file is currently open.
    pub fn is_open(&self) -> bool {
        self.handle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Take a reference, opening the database file if needed.
    ///
    /// Safe to call repeatedly; the file is opened once and each call
    /// increments the reference count.
    pub fn open(&self) -> Result<()> {
        self.acquire().map(|_| ())
    }

    /// Take a reference and return the database handle.
    fn acquire(&self) -> Result<Arc<Database>> {
        if self.opened.load(Ordering::Acquire) {
            if let Some(db) = self.borrow_open() {
                return Ok(db);
            }
        }

        let _guard = self.open_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished opening while we waited.
        if let Some(db) = self.borrow_open() {
            return Ok(db);
        }

        let db = Arc::new(open_database(&self.path)?);

        let mut handle = self.handle.write().unwrap_or_else(PoisonError::into_inner);
        *handle = Some(Arc::clone(&db));
        self.ref_count.store(1, Ordering::Release);
        self.opened.store(true, Ordering::Release);

        debug!(path = %self.path.display(), "opened disk store");
        Ok(db)
    }

    /// Increment the count against an already open handle.
    ///
    /// The increment happens under the handle's read lock, so it cannot
    /// interleave with `close` dropping the handle.
    fn borrow_open(&self) -> Option<Arc<Database>> {
        let handle = self.handle.read().unwrap_or_else(PoisonError::into_inner);
        let db = handle.as_ref()?;
        let count = self.ref_count.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(path = %self.path.display(), ref_count = count, "disk store reference taken");
        Some(Arc::clone(db))
    }

    fn missing_bucket(err: TableError) -> StorageError {
        match err {
            TableError::TableDoesNotExist(name) => StorageError::BucketMissing(name),
            other => StorageError::Backend(format!("open bucket: {other}")),
        }
    }
}

impl Default for DiskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStore")
            .field("path", &self.path)
            .field("opened", &self.opened.load(Ordering::Relaxed))
            .field("ref_count", &self.ref_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Store for DiskStore {
    fn get(&self, key: &str) -> Result<StoredValue> {
        let db = self.acquire()?;

        let txn = db
            .begin_read()
            .map_err(engine("unable to get value from disk store"))?;
        let table = match txn.open_table(BUCKET_TABLE) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(Self::missing_bucket(e)),
        };

        match table.get(key) {
            Ok(Some(value)) => Ok(StoredValue::Bytes(value.value().to_vec())),
            Ok(None) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::Backend(format!(
                "unable to get value from disk store for key {key}: {e}"
            ))),
        }
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<()> {
        let value = value.into_bytes("disk")?;
        let db = self.acquire()?;

        let txn = db
            .begin_write()
            .map_err(engine("unable to insert value into disk store"))?;
        {
            let mut table = txn.open_table(BUCKET_TABLE).map_err(Self::missing_bucket)?;
            table.insert(key, value.as_slice()).map_err(engine(format!(
                "unable to insert value into disk store for key {key}"
            )))?;
        }
        txn.commit()
            .map_err(engine("unable to insert value into disk store"))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let db = self.acquire()?;

        let txn = db
            .begin_write()
            .map_err(engine("unable to delete value from disk store"))?;
        {
            let mut table = txn.open_table(BUCKET_TABLE).map_err(Self::missing_bucket)?;
            table.remove(key).map_err(engine(format!(
                "unable to delete value from disk store for key {key}"
            )))?;
        }
        txn.commit()
            .map_err(engine("unable to delete value from disk store"))?;
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let db = self.acquire()?;

        let txn = db
            .begin_read()
            .map_err(engine("unable to check if key exists in disk store"))?;
        let table = txn.open_table(BUCKET_TABLE).map_err(Self::missing_bucket)?;
        let found = table.get(key).map_err(engine(format!(
            "unable to check if key {key} exists in disk store"
        )))?;
        Ok(found.is_some())
    }

    fn clear(&self) -> Result<()> {
        let db = self.acquire()?;

        let txn = db
            .begin_write()
            .map_err(engine("unable to clear disk store"))?;
        {
            let mut table = txn.open_table(BUCKET_TABLE).map_err(Self::missing_bucket)?;
            let keys = table
                .iter()
                .map_err(engine("unable to clear disk store"))?
                .map(|entry| entry.map(|(key, _)| key.value().to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(engine("unable to clear disk store"))?;

            // An error here drops the transaction uncommitted, rolling back
            // the removals already made.
            for key in &keys {
                table.remove(key.as_str()).map_err(engine(format!(
                    "unable to clear disk store at key {key}"
                )))?;
            }
        }
        txn.commit()
            .map_err(engine("unable to clear disk store"))?;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        let db = self.acquire()?;

        let txn = db
            .begin_read()
            .map_err(engine("unable to get size of disk store"))?;
        let table = txn.open_table(BUCKET_TABLE).map_err(Self::missing_bucket)?;
        table
            .len()
            .map_err(engine("unable to get size of disk store"))
    }

    fn list(&self, prefix: &str, limit: i64) -> Result<Vec<Entry>> {
        let db = self.acquire()?;
        let limit = list_limit(limit);

        let txn = db
            .begin_read()
            .map_err(engine("unable to list entries from disk store"))?;
        let table = txn.open_table(BUCKET_TABLE).map_err(Self::missing_bucket)?;

        let mut entries = Vec::new();
        let iter = table
            .range(prefix..)
            .map_err(engine("unable to list entries from disk store"))?;
        for entry in iter {
            let (key, value) = entry.map_err(engine("unable to list entries from disk store"))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            entries.push(Entry::new(key, StoredValue::Bytes(value.value().to_vec())));
            if limit.is_some_and(|limit| entries.len() >= limit) {
                break;
            }
        }

        Ok(entries)
    }

    fn close(&self) -> Result<()> {
        if !self.opened.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = self.open_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut handle = self.handle.write().unwrap_or_else(PoisonError::into_inner);
        if handle.is_none() {
            return Ok(());
        }

        let remaining = self.ref_count.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining > 0 {
            trace!(path = %self.path.display(), ref_count = remaining, "disk store reference released");
            return Ok(());
        }

        // redb closes the file once the last in-flight operation drops its
        // clone of the handle.
        self.ref_count.store(0, Ordering::Release);
        handle.take();
        self.opened.store(false, Ordering::Release);

        debug!(path = %self.path.display(), "closed disk store");
        Ok(())
    }

    fn release(&self) -> Result<()> {
        let _guard = self.open_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut handle = self.handle.write().unwrap_or_else(PoisonError::into_inner);
        if handle.take().is_none() {
            return Ok(());
        }

        let dropped = self.ref_count.swap(0, Ordering::AcqRel);
        self.opened.store(false, Ordering::Release);

        debug!(path = %self.path.display(), ref_count = dropped, "released disk store");
        Ok(())
    }

    fn name(&self) -> &str {
        "disk"
    }
}
