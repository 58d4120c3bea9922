//! Shared test utilities for chandler-engine tests.

use std::io::{self, Read};

use chandler_types::ChunkerConfig;

use crate::store::{BlobStore, BlobStoreConfig};

/// Generate deterministic, non-repeating test data.
pub fn test_data(size: usize) -> Vec<u8> {
    test_data_seeded(size, 0xDEAD_BEEF)
}

/// Like [`test_data`], from a different starting state.
pub fn test_data_seeded(size: usize, seed: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state = seed;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

/// Chunker sizes small enough to get many chunks out of a few hundred KB.
pub fn small_chunker() -> ChunkerConfig {
    ChunkerConfig {
        min_size: 2 * 1024,
        max_size: 64 * 1024,
        average_bits: 13,
    }
}

pub fn small_config() -> BlobStoreConfig {
    BlobStoreConfig {
        chunker: small_chunker(),
        sync_on_commit: false,
    }
}

/// In-memory store with small chunks.
pub fn memory_store() -> BlobStore {
    BlobStore::in_memory(small_config()).unwrap()
}

/// Fjall-backed temporary store with small chunks.
pub fn temp_store() -> BlobStore {
    BlobStore::open_temporary(small_config()).unwrap()
}

/// Reader that yields `data` and then fails instead of reaching EOF.
pub struct FailAfter {
    pub data: Vec<u8>,
    pub pos: usize,
}

impl FailAfter {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl Read for FailAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "source went away"));
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
