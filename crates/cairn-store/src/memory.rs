use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use cairn_crypto::BlobHasher;
use cairn_types::{BlobRef, HashAlgorithm, SizedBlobRef};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobReceiver, BlobStore};

type BlobMap = Arc<RwLock<BTreeMap<BlobRef, Bytes>>>;

/// In-memory, `BTreeMap`-based blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock`; the
/// ordered map gives `list` its ordering directly. Bytes are reference
/// counted, so reads never copy blob contents.
pub struct InMemoryBlobStore {
    blobs: BlobMap,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, blob_ref: &BlobRef, data: Bytes) -> StoreResult<SizedBlobRef> {
        BlobHasher::verify_bytes(blob_ref, &data)?;
        Ok(insert_verified(&self.blobs, blob_ref, data))
    }

    fn receive(&self, algorithm: Option<HashAlgorithm>) -> StoreResult<Box<dyn BlobReceiver>> {
        Ok(Box::new(MemoryReceiver {
            blobs: Arc::clone(&self.blobs),
            buf: Vec::new(),
            hasher: algorithm.map(BlobHasher::new),
        }))
    }

    fn get(&self, blob_ref: &BlobRef) -> StoreResult<Bytes> {
        let map = self.blobs.read().expect("lock poisoned");
        map.get(blob_ref)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(blob_ref.clone()))
    }

    fn check(&self, blob_ref: &BlobRef) -> StoreResult<Option<SizedBlobRef>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map
            .get(blob_ref)
            .map(|b| SizedBlobRef::new(blob_ref.clone(), b.len() as u64)))
    }

    fn list(&self, after: Option<&BlobRef>, limit: usize) -> StoreResult<Vec<SizedBlobRef>> {
        let lower = after.map_or(Bound::Unbounded, |r| Bound::Excluded(r.clone()));
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(r, b)| SizedBlobRef::new(r.clone(), b.len() as u64))
            .collect())
    }
}

fn insert_verified(blobs: &BlobMap, blob_ref: &BlobRef, data: Bytes) -> SizedBlobRef {
    let size = data.len() as u64;
    let mut map = blobs.write().expect("lock poisoned");
    map.entry(blob_ref.clone()).or_insert(data);
    SizedBlobRef::new(blob_ref.clone(), size)
}

struct MemoryReceiver {
    blobs: BlobMap,
    buf: Vec<u8>,
    hasher: Option<BlobHasher>,
}

impl BlobReceiver for MemoryReceiver {
    fn write_chunk(&mut self, data: &[u8]) -> StoreResult<()> {
        if let Some(hasher) = &mut self.hasher {
            hasher.update(data);
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.buf.len() as u64
    }

    fn commit(self: Box<Self>, claimed: &BlobRef) -> StoreResult<SizedBlobRef> {
        let Self { blobs, buf, hasher } = *self;
        match hasher {
            Some(h) if h.algorithm() == claimed.algorithm() => {
                h.verify(claimed)?;
            }
            _ => BlobHasher::verify_bytes(claimed, &buf)?,
        }
        Ok(insert_verified(&blobs, claimed, Bytes::from(buf)))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &count)
            .finish()
    }
}
