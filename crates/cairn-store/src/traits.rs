use bytes::Bytes;
use cairn_types::{BlobRef, HashAlgorithm, SizedBlobRef};

use crate::error::StoreResult;

/// Largest page `list` hands out, and the page size when none is asked for.
pub const DEFAULT_LIST_LIMIT: usize = 1000;

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - `put` never trusts the claimed ref: bytes are hashed with the ref's
///   algorithm and rejected on mismatch, leaving nothing behind.
/// - Blobs are immutable. Re-putting an existing ref is a successful no-op.
/// - Write-then-publish: a blob is visible to `get`, `check` and `list`
///   only once fully written and verified.
/// - `list` yields refs in ascending order of their string form.
pub trait BlobStore: Send + Sync {
    /// Verify `data` against `blob_ref` and store it.
    fn put(&self, blob_ref: &BlobRef, data: Bytes) -> StoreResult<SizedBlobRef>;

    /// Read a blob's bytes. Fails with `NotFound` if absent.
    fn get(&self, blob_ref: &BlobRef) -> StoreResult<Bytes>;

    /// Existence check. Returns the ref with its size if present.
    fn check(&self, blob_ref: &BlobRef) -> StoreResult<Option<SizedBlobRef>>;

    /// Up to `limit` refs in ascending order, starting strictly after `after`.
    fn list(&self, after: Option<&BlobRef>, limit: usize) -> StoreResult<Vec<SizedBlobRef>>;

    /// Start receiving a blob whose bytes arrive in chunks.
    ///
    /// `algorithm` is the algorithm of the ref the bytes will be committed
    /// under, when already known; chunks are then hashed as they arrive.
    /// Nothing becomes visible until [`BlobReceiver::commit`] verifies the
    /// bytes. Dropping the receiver discards them.
    fn receive(&self, algorithm: Option<HashAlgorithm>) -> StoreResult<Box<dyn BlobReceiver>>;

    fn contains(&self, blob_ref: &BlobRef) -> StoreResult<bool> {
        Ok(self.check(blob_ref)?.is_some())
    }

    /// The subset of `refs` that are present, in input order.
    ///
    /// Default implementation calls `check()` for each ref.
    fn stat_many(&self, refs: &[BlobRef]) -> StoreResult<Vec<SizedBlobRef>> {
        refs.iter()
            .filter_map(|r| self.check(r).transpose())
            .collect()
    }
}

/// A blob being written chunk by chunk. See [`BlobStore::receive`].
pub trait BlobReceiver: Send {
    fn write_chunk(&mut self, data: &[u8]) -> StoreResult<()>;

    /// Bytes received so far.
    fn bytes_written(&self) -> u64;

    /// Verify everything written against `claimed` and publish it.
    ///
    /// On `DigestMismatch` the staged bytes are discarded.
    fn commit(self: Box<Self>, claimed: &BlobRef) -> StoreResult<SizedBlobRef>;
}
