//! Content-addressed blob storage for Cairn.
//!
//! Blobs are opaque byte sequences named by the digest of their own
//! contents (see [`cairn_types::BlobRef`]). Stores verify every write
//! against the claimed ref, so a stored blob always matches its name.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FilesystemBlobStore`] -- sharded directory tree on local disk
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written (content addressing guarantees this).
//! 2. Write-then-publish: hash, write, then make visible. Large bodies
//!    stream through [`BlobStore::receive`] without being held in memory.
//! 3. Concurrent reads are always safe, including during writes.
//! 4. Concurrent writes of the same ref converge to the same bytes.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod filesystem;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use filesystem::FilesystemBlobStore;
pub use memory::InMemoryBlobStore;
pub use traits::{BlobReceiver, BlobStore, DEFAULT_LIST_LIMIT};
