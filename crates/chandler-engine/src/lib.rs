//! Deduplicating, content-addressed blob store.
//!
//! [`BlobStore`] splits each ingested stream into content-defined chunks,
//! stores every distinct chunk once under its BLAKE3 digest, and records the
//! ordered digest list as a manifest keyed by the blob's superhash (the
//! BLAKE3 of the concatenated digests). [`BlobStore::retrieve`] streams a
//! blob back through a [`BlobReader`].

pub mod error;
pub mod ingest;
pub mod reader;
pub mod store;

pub use error::EngineError;
pub use ingest::IngestReport;
pub use reader::BlobReader;
pub use store::{BlobStore, BlobStoreConfig, StoreStats};

pub use chandler_cas::{Manifest, Polynomial};
pub use chandler_store::KvStore;
pub use chandler_types::{BlobId, ChunkId, ChunkerConfig};

#[cfg(test)]
mod tests;
