//! Ingestion: stream → chunks → manifest → superhash, in one transaction.

use std::io::Read;
use std::time::Instant;

use chandler_cas::Manifest;
use chandler_types::BlobId;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::store::BlobStore;

type Result<T> = std::result::Result<T, EngineError>;

/// Outcome of one ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Superhash of the ingested stream.
    pub blob_id: BlobId,
    /// Chunks in the manifest, duplicates included.
    pub chunks: usize,
    /// Chunks that were not already stored.
    pub new_chunks: usize,
    /// Length of the ingested stream.
    pub bytes: u64,
}

impl BlobStore {
    /// Ingest a stream and return its superhash.
    pub fn ingest<R: Read>(&self, reader: R) -> Result<BlobId> {
        Ok(self.ingest_with_report(reader)?.blob_id)
    }

    /// Ingest an in-memory buffer.
    pub fn ingest_bytes(&self, data: &[u8]) -> Result<BlobId> {
        self.ingest(data)
    }

    /// Ingest a stream, reporting chunk and byte counts.
    ///
    /// The stream is read to the end inside a single write transaction.
    /// On any error (a failing reader included) the transaction is dropped
    /// and the store is left exactly as it was.
    pub fn ingest_with_report<R: Read>(&self, reader: R) -> Result<IngestReport> {
        let started = Instant::now();
        let mut tx = self.kv.write_tx();
        let mut manifest = Manifest::new();
        let mut new_chunks = 0;
        let mut bytes = 0u64;

        for chunk in self.params.chunker(reader) {
            let chunk = chunk?;
            bytes += chunk.data.len() as u64;
            let len = chunk.data.len();
            if tx.put_chunk_if_absent(&chunk.id, chunk.data)? {
                new_chunks += 1;
            }
            debug!(chunk = %chunk.id, offset = chunk.offset, len, "chunk");
            manifest.push(chunk.id);
        }

        let blob_id = manifest.blob_id();
        tx.put_manifest(&blob_id, &manifest);
        tx.commit()?;

        let report = IngestReport {
            blob_id,
            chunks: manifest.len(),
            new_chunks,
            bytes,
        };
        info!(
            blob = %blob_id,
            bytes,
            chunks = report.chunks,
            new_chunks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ingested blob"
        );
        Ok(report)
    }
}
