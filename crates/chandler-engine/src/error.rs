//! Error types for the blob store facade.

use chandler_cas::CasError;
use chandler_store::StoreError;

/// Errors returned by [`BlobStore`](crate::BlobStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Failed to access the key-value store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Chunking or polynomial error.
    #[error("cas error: {0}")]
    Cas(CasError),

    /// The input stream failed during ingestion.
    #[error("stream read failed: {0}")]
    StreamRead(#[source] std::io::Error),
}

impl From<CasError> for EngineError {
    fn from(e: CasError) -> Self {
        match e {
            CasError::Io(io) => Self::StreamRead(io),
            other => Self::Cas(other),
        }
    }
}

impl EngineError {
    /// Whether the blob or one of its chunks does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }

    /// Whether persisted data failed validation.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Store(StoreError::Corruption(_)))
    }
}
