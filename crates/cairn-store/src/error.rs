use std::path::PathBuf;

use cairn_crypto::DigestMismatch;
use cairn_types::BlobRef;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(BlobRef),

    /// Submitted bytes do not hash to the claimed ref. Nothing was stored.
    #[error(transparent)]
    DigestMismatch(#[from] DigestMismatch),

    /// Stored bytes no longer hash to their ref (data corruption).
    #[error("corrupt blob {blob_ref}: contents hash to {computed}")]
    Corrupt { blob_ref: BlobRef, computed: BlobRef },

    /// The published file does not have the length that was written.
    #[error("size mismatch for {blob_ref}: wrote {expected} bytes, found {actual}")]
    SizeMismatch {
        blob_ref: BlobRef,
        expected: u64,
        actual: u64,
    },

    /// The storage root is missing or not a directory.
    #[error("storage root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
