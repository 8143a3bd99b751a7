//! Foundation types for Cairn, a content-addressed blob server.
//!
//! Every other Cairn crate depends on `cairn-types`.
//!
//! # Key Types
//!
//! - [`BlobRef`]: `<algorithm>-<hexdigest>` name of a blob, ordered by its string form
//! - [`HashAlgorithm`]: the digest algorithms a ref may name
//! - [`SizedBlobRef`]: a ref paired with the stored blob's length

pub mod blob_ref;
pub mod error;

pub use blob_ref::{BlobRef, HashAlgorithm, SizedBlobRef};
pub use error::RefError;
