//! HTTP client for Cairn.
//!
//! Names local files by their digest and pushes them to a server with the
//! `preupload`/`upload` exchange, skipping blobs the server already has.

pub mod client;
pub mod error;

pub use client::{hash_file, CairnClient, UploadOutcome, DEFAULT_SERVER};
pub use error::{ClientError, ClientResult};
