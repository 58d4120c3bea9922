//! Chunk records: `chunk/<digest>` → raw bytes.

use bytes::Bytes;
use chandler_types::ChunkId;
use tracing::trace;

use crate::error::StoreError;
use crate::keys::{CHUNK_PREFIX, chunk_key};
use crate::kv::{KvStore, PrefixStats, WriteTx};

type Result<T> = std::result::Result<T, StoreError>;

impl KvStore {
    /// Fetch a committed chunk.
    pub fn get_chunk(&self, id: &ChunkId) -> Result<Bytes> {
        self.get(&chunk_key(id))?
            .ok_or(StoreError::ChunkNotFound(*id))
    }

    /// Whether a chunk is committed.
    pub fn has_chunk(&self, id: &ChunkId) -> Result<bool> {
        self.contains(&chunk_key(id))
    }

    /// Number of stored chunks and their total size.
    pub fn chunk_stats(&self) -> Result<PrefixStats> {
        self.prefix_stats(CHUNK_PREFIX)
    }
}

impl WriteTx<'_> {
    /// Stage a chunk unless it already exists.
    ///
    /// Returns `true` if the chunk was new. An existing record is never
    /// rewritten: its content is determined by its digest.
    pub fn put_chunk_if_absent(&mut self, id: &ChunkId, data: Bytes) -> Result<bool> {
        let key = chunk_key(id);
        if self.contains(&key)? {
            trace!(chunk = %id, "chunk already stored");
            return Ok(false);
        }
        self.insert(key, data);
        Ok(true)
    }
}
