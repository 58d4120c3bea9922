//! Retrieval: superhash → lazily fetched byte stream.

use std::collections::VecDeque;
use std::io::{self, Read};

use bytes::Bytes;
use chandler_store::{KvStore, StoreError};
use chandler_types::{BlobId, ChunkId};
use tracing::{debug, trace};

use crate::error::EngineError;
use crate::store::BlobStore;

type Result<T> = std::result::Result<T, EngineError>;

/// Sequential reader over a stored blob.
///
/// Chunks are fetched from the store one at a time, as reads reach them.
/// The reader is forward-only: once bytes are returned they cannot be read
/// again through the same reader.
pub struct BlobReader<'s> {
    kv: &'s KvStore,
    blob_id: BlobId,
    /// Chunks not yet fully consumed; the head is the one being read.
    remaining: VecDeque<ChunkId>,
    /// Bytes of the head chunk, once fetched.
    current: Option<Bytes>,
    /// Read position within `current`.
    offset: usize,
}

impl BlobReader<'_> {
    /// Superhash of the blob being read.
    pub fn blob_id(&self) -> BlobId {
        self.blob_id
    }

    /// Chunks not yet fully read, the partially read one included.
    pub fn remaining_chunks(&self) -> usize {
        self.remaining.len()
    }

    fn fetch(&self, id: &ChunkId) -> io::Result<Bytes> {
        trace!(blob = %self.blob_id, chunk = %id, "fetching chunk");
        self.kv.get_chunk(id).map_err(|e| match e {
            StoreError::ChunkNotFound(_) => io::Error::new(io::ErrorKind::NotFound, e),
            other => io::Error::other(other),
        })
    }
}

impl Read for BlobReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let Some(head) = self.remaining.front() else {
                return Ok(0);
            };
            let chunk = match &self.current {
                Some(chunk) => chunk.clone(),
                None => {
                    let chunk = self.fetch(head)?;
                    self.current = Some(chunk.clone());
                    self.offset = 0;
                    chunk
                }
            };

            let n = buf.len().min(chunk.len() - self.offset);
            buf[..n].copy_from_slice(&chunk[self.offset..self.offset + n]);
            self.offset += n;

            if self.offset >= chunk.len() {
                self.remaining.pop_front();
                self.current = None;
                self.offset = 0;
            }
            if n > 0 {
                return Ok(n);
            }
        }
    }
}

impl BlobStore {
    /// Open a reader over a stored blob.
    ///
    /// Fails with a not-found error if no manifest exists for `id`, or a
    /// corruption error if the manifest is malformed. Missing chunks are
    /// only detected when the reader reaches them.
    pub fn retrieve(&self, id: &BlobId) -> Result<BlobReader<'_>> {
        let manifest = self.kv.get_manifest(id)?;
        debug!(blob = %id, chunks = manifest.len(), "opened blob");
        Ok(BlobReader {
            kv: &self.kv,
            blob_id: *id,
            remaining: manifest.into_chunks().into(),
            current: None,
            offset: 0,
        })
    }

    /// Read a whole blob into memory.
    pub fn read_blob(&self, id: &BlobId) -> Result<Vec<u8>> {
        let manifest = self.kv.get_manifest(id)?;
        let mut out = Vec::new();
        for chunk_id in manifest.chunks() {
            out.extend_from_slice(&self.kv.get_chunk(chunk_id)?);
        }
        Ok(out)
    }
}
