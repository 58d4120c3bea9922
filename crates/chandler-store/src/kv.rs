//! Key-value engine with single-writer atomic transactions.
//!
//! Two backends sit behind [`KvStore`]: Fjall on disk, or a `BTreeMap` in
//! memory. Both expose the same contract:
//!
//! - Reads through [`KvStore`] see only committed data.
//! - A [`WriteTx`] holds the writer lock, stages every write in memory and
//!   reads its own staged writes.
//! - [`WriteTx::commit`] applies the staged writes as one atomic batch.
//!   Dropping a transaction without committing discards them.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use bytes::Bytes;
use fjall::{Database, Keyspace, KeyspaceCreateOptions, PersistMode};
use tempfile::TempDir;
use tracing::debug;

use crate::error::{StoreError, storage_err};

type Result<T> = std::result::Result<T, StoreError>;

/// Name of the Fjall keyspace holding every record.
const KEYSPACE: &str = "chandler";

/// Inner backend: either Fjall-backed (disk) or pure in-memory.
enum Backend {
    Fjall {
        db: Database,
        data: Keyspace,
        /// Keeps a temporary directory alive for as long as the database.
        _tmp: Option<TempDir>,
    },
    Memory(RwLock<BTreeMap<Vec<u8>, Bytes>>),
}

/// Totals over the records under one key prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefixStats {
    /// Number of records.
    pub count: u64,
    /// Sum of value lengths in bytes.
    pub bytes: u64,
}

/// Transactional key-value store.
pub struct KvStore {
    backend: Backend,
    /// Serializes write transactions.
    writer: Mutex<()>,
    /// Fsync the journal after every commit.
    sync_on_commit: bool,
}

impl KvStore {
    /// Open a persistent store at the given path (Fjall backend).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::builder(path).open().map_err(storage_err)?;
        debug!(path = %path.display(), "opened fjall database");
        Self::init_fjall(db, None)
    }

    /// Open a Fjall store in a temporary directory, removed on drop.
    pub fn open_temporary() -> Result<Self> {
        let tmp = tempfile::tempdir().map_err(storage_err)?;
        let db = Database::builder(tmp.path())
            .temporary(true)
            .open()
            .map_err(storage_err)?;
        Self::init_fjall(db, Some(tmp))
    }

    /// Create a pure in-memory store.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(RwLock::new(BTreeMap::new())),
            writer: Mutex::new(()),
            sync_on_commit: false,
        }
    }

    fn init_fjall(db: Database, tmp: Option<TempDir>) -> Result<Self> {
        let data = db
            .keyspace(KEYSPACE, KeyspaceCreateOptions::default)
            .map_err(storage_err)?;
        Ok(Self {
            backend: Backend::Fjall {
                db,
                data,
                _tmp: tmp,
            },
            writer: Mutex::new(()),
            sync_on_commit: false,
        })
    }

    /// Fsync after every commit (Fjall backend only).
    pub fn with_sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }

    /// Read a committed value.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        match &self.backend {
            Backend::Fjall { data, .. } => Ok(data
                .get(key)
                .map_err(storage_err)?
                .map(|v| Bytes::from(v.to_vec()))),
            Backend::Memory(m) => Ok(m
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .cloned()),
        }
    }

    /// Whether a committed value exists for `key`.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        match &self.backend {
            Backend::Fjall { data, .. } => data.contains_key(key).map_err(storage_err),
            Backend::Memory(m) => Ok(m
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(key)),
        }
    }

    /// Count committed records under `prefix` and sum their value sizes.
    ///
    /// Note: this is an O(n) scan.
    pub fn prefix_stats(&self, prefix: &[u8]) -> Result<PrefixStats> {
        let mut stats = PrefixStats::default();
        match &self.backend {
            Backend::Fjall { data, .. } => {
                for guard in data.prefix(prefix) {
                    let (_key, value) = guard.into_inner().map_err(storage_err)?;
                    stats.count += 1;
                    stats.bytes += value.len() as u64;
                }
            }
            Backend::Memory(m) => {
                let map = m.read().unwrap_or_else(PoisonError::into_inner);
                for (_key, value) in map
                    .range(prefix.to_vec()..)
                    .take_while(|(k, _)| k.starts_with(prefix))
                {
                    stats.count += 1;
                    stats.bytes += value.len() as u64;
                }
            }
        }
        Ok(stats)
    }

    /// Begin a write transaction, blocking until no other one is open.
    pub fn write_tx(&self) -> WriteTx<'_> {
        let guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        WriteTx {
            store: self,
            staged: BTreeMap::new(),
            _guard: guard,
        }
    }

    /// Apply a set of writes atomically.
    fn apply(&self, staged: BTreeMap<Vec<u8>, Bytes>) -> Result<()> {
        match &self.backend {
            Backend::Fjall { db, data, .. } => {
                let mut batch = db.batch();
                for (key, value) in &staged {
                    batch.insert(data, key.as_slice(), value.as_ref());
                }
                batch.commit().map_err(storage_err)?;
                if self.sync_on_commit {
                    db.persist(PersistMode::SyncAll).map_err(storage_err)?;
                }
            }
            Backend::Memory(m) => {
                m.write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(staged);
            }
        }
        Ok(())
    }
}

/// An open write transaction.
///
/// Holds the store's writer lock until committed or dropped.
pub struct WriteTx<'a> {
    store: &'a KvStore,
    staged: BTreeMap<Vec<u8>, Bytes>,
    _guard: MutexGuard<'a, ()>,
}

impl WriteTx<'_> {
    /// Read a value, seeing this transaction's own staged writes first.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        match self.staged.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.store.get(key),
        }
    }

    /// Whether `key` exists in the staged writes or the committed store.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        if self.staged.contains_key(key) {
            return Ok(true);
        }
        self.store.contains(key)
    }

    /// Stage a write. Nothing is visible to readers until commit.
    pub fn insert(&mut self, key: Vec<u8>, value: impl Into<Bytes>) {
        self.staged.insert(key, value.into());
    }

    /// Number of staged writes.
    #[cfg(test)]
    pub(crate) fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Atomically apply every staged write.
    pub fn commit(self) -> Result<()> {
        let writes = self.staged.len();
        if writes == 0 {
            return Ok(());
        }
        let bytes: usize = self.staged.values().map(Bytes::len).sum();
        self.store.apply(self.staged)?;
        debug!(writes, bytes, "committed write transaction");
        Ok(())
    }
}
