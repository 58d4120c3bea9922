//! Error types for the blob store persistence layer.

use chandler_types::{BlobId, ChunkId, ChunkerConfig};

/// Errors returned by [`KvStore`](crate::KvStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage engine failed to read, write, or commit.
    #[error("storage error: {0}")]
    Storage(String),

    /// A chunk referenced by digest is not in the store.
    #[error("chunk not found: {0}")]
    ChunkNotFound(ChunkId),

    /// No manifest is stored under this superhash.
    #[error("blob not found: {0}")]
    BlobNotFound(BlobId),

    /// Persisted data violates the store layout.
    #[error("corruption: {0}")]
    Corruption(String),

    /// The store was created by a build with a different schema.
    #[error("schema version mismatch: store has {found}, this build expects {expected}")]
    VersionMismatch {
        /// Version byte persisted in the store.
        found: u8,
        /// Version this build reads and writes.
        expected: u8,
    },

    /// Chunk size settings differ from those the store was created with.
    #[error("chunker settings mismatch: store uses {stored:?}, requested {requested:?}")]
    ChunkerMismatch {
        /// Settings recorded when the store was created.
        stored: ChunkerConfig,
        /// Settings supplied on this open.
        requested: ChunkerConfig,
    },
}

impl StoreError {
    /// Whether this is a missing chunk or blob.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ChunkNotFound(_) | Self::BlobNotFound(_))
    }
}

pub(crate) fn storage_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(e.to_string())
}
