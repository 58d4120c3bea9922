//! Blob manifests: the ordered chunk list that rebuilds one stream.
//!
//! A manifest is persisted as the flat concatenation of its 32-byte chunk
//! digests. The blob's [`BlobId`] (superhash) is `blake3` of exactly those
//! bytes, so the encoding is part of the identity and must never change.

use chandler_types::{BlobId, ChunkId, DIGEST_LEN};

use crate::error::CasError;

/// Ordered list of chunk digests for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    chunks: Vec<ChunkId>,
}

impl Manifest {
    /// An empty manifest (the manifest of an empty stream).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next chunk in stream order.
    pub fn push(&mut self, id: ChunkId) {
        self.chunks.push(id);
    }

    /// Chunk digests in stream order.
    pub fn chunks(&self) -> &[ChunkId] {
        &self.chunks
    }

    /// Consume the manifest, returning its chunk list.
    pub fn into_chunks(self) -> Vec<ChunkId> {
        self.chunks
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the manifest lists no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Flat `digest ++ digest ++ ...` encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.chunks.len() * DIGEST_LEN);
        for id in &self.chunks {
            buf.extend_from_slice(id.as_bytes());
        }
        buf
    }

    /// Decode the flat encoding.
    ///
    /// A length that is not a multiple of [`DIGEST_LEN`] is corruption and
    /// is rejected rather than truncated.
    pub fn decode(bytes: &[u8]) -> Result<Self, CasError> {
        if bytes.len() % DIGEST_LEN != 0 {
            return Err(CasError::CorruptManifest {
                len: bytes.len(),
                width: DIGEST_LEN,
            });
        }

        let chunks = bytes
            .chunks_exact(DIGEST_LEN)
            .map(|record| {
                let mut id = [0u8; DIGEST_LEN];
                id.copy_from_slice(record);
                ChunkId::from(id)
            })
            .collect();
        Ok(Self { chunks })
    }

    /// The superhash: `blake3` over the flat encoding.
    pub fn blob_id(&self) -> BlobId {
        BlobId::from_data(&self.encode())
    }
}

impl FromIterator<ChunkId> for Manifest {
    fn from_iter<I: IntoIterator<Item = ChunkId>>(iter: I) -> Self {
        Self {
            chunks: iter.into_iter().collect(),
        }
    }
}
