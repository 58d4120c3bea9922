//! Blob manifests: `blob/<superhash>` → flat chunk digest list.

use chandler_cas::Manifest;
use chandler_types::BlobId;

use crate::error::StoreError;
use crate::keys::{BLOB_PREFIX, blob_key};
use crate::kv::{KvStore, WriteTx};

type Result<T> = std::result::Result<T, StoreError>;

impl KvStore {
    /// Load a committed manifest.
    ///
    /// A record whose length is not a multiple of the digest width is
    /// reported as [`StoreError::Corruption`].
    pub fn get_manifest(&self, id: &BlobId) -> Result<Manifest> {
        let bytes = self
            .get(&blob_key(id))?
            .ok_or(StoreError::BlobNotFound(*id))?;
        Manifest::decode(&bytes).map_err(|e| StoreError::Corruption(format!("blob {id}: {e}")))
    }

    /// Whether a manifest is committed under this superhash.
    pub fn has_manifest(&self, id: &BlobId) -> Result<bool> {
        self.contains(&blob_key(id))
    }

    /// Number of stored manifests.
    pub fn manifest_count(&self) -> Result<u64> {
        Ok(self.prefix_stats(BLOB_PREFIX)?.count)
    }
}

impl WriteTx<'_> {
    /// Stage a manifest under its superhash.
    ///
    /// Re-putting an identical manifest writes the same bytes.
    pub fn put_manifest(&mut self, id: &BlobId, manifest: &Manifest) {
        self.insert(blob_key(id), manifest.encode());
    }
}

#[cfg(test)]
mod tests {
    use chandler_types::ChunkId;

    use super::*;

    #[test]
    fn test_manifest_persists_in_order() {
        let kv = KvStore::open_temporary().unwrap();
        let manifest: Manifest = [b"one".as_slice(), b"two", b"one"]
            .into_iter()
            .map(ChunkId::from_data)
            .collect();
        let id = manifest.blob_id();

        let mut tx = kv.write_tx();
        tx.put_manifest(&id, &manifest);
        tx.commit().unwrap();

        assert!(kv.has_manifest(&id).unwrap());
        assert_eq!(kv.get_manifest(&id).unwrap(), manifest);
        assert_eq!(kv.manifest_count().unwrap(), 1);
    }

    #[test]
    fn test_missing_manifest() {
        let kv = KvStore::in_memory();
        let id = BlobId::from_data(b"nothing");
        assert!(matches!(
            kv.get_manifest(&id),
            Err(StoreError::BlobNotFound(missing)) if missing == id
        ));
    }

    #[test]
    fn test_truncated_manifest_is_corruption() {
        let kv = KvStore::in_memory();
        let id = BlobId::from_data(b"broken");

        let mut tx = kv.write_tx();
        tx.insert(blob_key(&id), vec![0u8; 45]);
        tx.commit().unwrap();

        let err = kv.get_manifest(&id).unwrap_err();
        assert!(matches!(err, StoreError::Corruption(_)), "got {err:?}");
        assert!(!err.is_not_found());
    }
}
