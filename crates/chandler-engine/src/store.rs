//! The [`BlobStore`] facade: bootstrap, configuration, and statistics.
//!
//! Ingestion lives in [`crate::ingest`], retrieval in [`crate::reader`].

use std::path::Path;

use chandler_cas::{CasError, ChunkerParams, Polynomial, validate_config};
use chandler_store::{KvStore, SCHEMA_VERSION, StoreError};
use chandler_types::{BlobId, ChunkerConfig};
use tracing::{debug, info};

use crate::error::EngineError;

type Result<T> = std::result::Result<T, EngineError>;

/// Configuration for opening a [`BlobStore`].
#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    /// Chunk size bounds and cut-point mask width.
    pub chunker: ChunkerConfig,
    /// Fsync after every committed ingestion (on-disk stores only).
    pub sync_on_commit: bool,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            sync_on_commit: true,
        }
    }
}

/// Snapshot of what a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Persisted schema version.
    pub schema_version: u8,
    /// Chunking polynomial fixed at creation.
    pub polynomial: Polynomial,
    /// Number of distinct chunks.
    pub chunk_count: u64,
    /// Total size of all distinct chunks.
    pub chunk_bytes: u64,
    /// Number of stored manifests.
    pub blob_count: u64,
}

/// A deduplicating, content-addressed blob store.
///
/// Safe to share across threads. Ingestions are serialized by the
/// underlying write lock; retrievals run concurrently and only observe
/// committed ingestions.
pub struct BlobStore {
    pub(crate) kv: KvStore,
    pub(crate) params: ChunkerParams,
}

impl BlobStore {
    /// Open (or create) a store on disk.
    pub fn open(path: impl AsRef<Path>, config: BlobStoreConfig) -> Result<Self> {
        validate_config(&config.chunker)?;
        let kv = KvStore::open(path)?.with_sync_on_commit(config.sync_on_commit);
        Self::from_kv(kv, config)
    }

    /// Open a fresh on-disk store in a temporary directory.
    pub fn open_temporary(config: BlobStoreConfig) -> Result<Self> {
        validate_config(&config.chunker)?;
        let kv = KvStore::open_temporary()?.with_sync_on_commit(config.sync_on_commit);
        Self::from_kv(kv, config)
    }

    /// Create a store that lives only in memory.
    pub fn in_memory(config: BlobStoreConfig) -> Result<Self> {
        Self::from_kv(KvStore::in_memory(), config)
    }

    /// Wrap an already opened key-value store, initializing it if empty.
    pub fn from_kv(kv: KvStore, config: BlobStoreConfig) -> Result<Self> {
        validate_config(&config.chunker)?;
        let polynomial = bootstrap(&kv, &config.chunker)?;
        let params = ChunkerParams::new(polynomial, config.chunker).map_err(|e| match e {
            CasError::UnusablePolynomial { .. } => {
                EngineError::Store(StoreError::Corruption(e.to_string()))
            }
            other => EngineError::from(other),
        })?;
        debug!(
            %polynomial,
            min_size = config.chunker.min_size,
            max_size = config.chunker.max_size,
            average_bits = config.chunker.average_bits,
            "blob store ready"
        );
        Ok(Self { kv, params })
    }

    /// The chunking polynomial of this store.
    pub fn polynomial(&self) -> Polynomial {
        self.params.polynomial()
    }

    /// Chunker settings in use.
    pub fn chunker_config(&self) -> &ChunkerConfig {
        self.params.config()
    }

    /// Whether a manifest exists for this superhash.
    pub fn contains_blob(&self, id: &BlobId) -> Result<bool> {
        Ok(self.kv.has_manifest(id)?)
    }

    /// Count chunks, bytes, and blobs.
    ///
    /// Note: scans every chunk record.
    pub fn stats(&self) -> Result<StoreStats> {
        let chunks = self.kv.chunk_stats()?;
        Ok(StoreStats {
            schema_version: self.kv.schema_version()?.unwrap_or(SCHEMA_VERSION),
            polynomial: self.polynomial(),
            chunk_count: chunks.count,
            chunk_bytes: chunks.bytes,
            blob_count: self.kv.manifest_count()?,
        })
    }

    /// The underlying key-value store.
    pub fn kv(&self) -> &KvStore {
        &self.kv
    }
}

/// Check or create the schema records, returning the chunking polynomial.
///
/// Runs in one write transaction so concurrent first opens cannot write two
/// different polynomials. The chunk size settings are pinned the same way:
/// reopening with different ones is refused.
fn bootstrap(kv: &KvStore, chunker: &ChunkerConfig) -> Result<Polynomial> {
    let mut tx = kv.write_tx();
    match tx.schema_version()? {
        None => {
            let polynomial = Polynomial::random()?;
            tx.set_schema_version(SCHEMA_VERSION);
            tx.set_polynomial(polynomial);
            tx.set_chunker(chunker);
            tx.commit()?;
            info!(
                version = SCHEMA_VERSION,
                %polynomial,
                "initialized new blob store"
            );
            Ok(polynomial)
        }
        Some(found) if found != SCHEMA_VERSION => Err(StoreError::VersionMismatch {
            found,
            expected: SCHEMA_VERSION,
        }
        .into()),
        Some(_) => {
            let polynomial = tx
                .stored_polynomial()?
                .ok_or_else(|| StoreError::Corruption("polynomial record is missing".into()))?;
            if !polynomial.is_irreducible() {
                return Err(StoreError::Corruption(format!(
                    "stored polynomial {polynomial} is not irreducible"
                ))
                .into());
            }

            match tx.stored_chunker()? {
                Some(stored) if stored != *chunker => {
                    return Err(StoreError::ChunkerMismatch {
                        stored,
                        requested: *chunker,
                    }
                    .into());
                }
                Some(_) => {}
                None => {
                    // Stores created before the settings were recorded adopt
                    // the first ones they are opened with.
                    tx.set_chunker(chunker);
                    tx.commit()?;
                    info!(?chunker, "recorded chunker settings");
                }
            }
            Ok(polynomial)
        }
    }
}
