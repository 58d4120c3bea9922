//! Key layout of the single `chandler` keyspace.
//!
//! | key                 | value                                  |
//! |---------------------|----------------------------------------|
//! | `version`           | 1 byte schema version                  |
//! | `polynomial`        | 8 bytes, little-endian `u64`           |
//! | `chunker`           | min, max (LE `u64`), average bits (LE `u32`) |
//! | `chunk/<32 bytes>`  | raw chunk bytes                        |
//! | `blob/<32 bytes>`   | flat concatenation of chunk digests    |

use chandler_types::{BlobId, ChunkId};

pub const VERSION_KEY: &[u8] = b"version";
pub const POLYNOMIAL_KEY: &[u8] = b"polynomial";
pub const CHUNKER_KEY: &[u8] = b"chunker";
pub const CHUNK_PREFIX: &[u8] = b"chunk/";
pub const BLOB_PREFIX: &[u8] = b"blob/";

fn prefixed(prefix: &[u8], id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(id);
    key
}

pub fn chunk_key(id: &ChunkId) -> Vec<u8> {
    prefixed(CHUNK_PREFIX, id.as_bytes())
}

pub fn blob_key(id: &BlobId) -> Vec<u8> {
    prefixed(BLOB_PREFIX, id.as_bytes())
}
