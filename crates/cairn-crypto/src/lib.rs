//! Digest primitives for Cairn.
//!
//! Computes and verifies the digest named by a [`cairn_types::BlobRef`].
//! All hashing wraps established libraries (`sha1`, `sha2`, `blake3`).

pub mod hasher;

pub use hasher::{BlobHasher, DigestMismatch};
