//! HTTP server for Cairn.
//!
//! Exposes a [`cairn_store::BlobStore`] over HTTP: `put`, `get`, `check` and
//! `list`, plus the batch `preupload`/`upload` pair, with optional
//! shared-secret Basic authentication.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{AllowAllAuth, AuthProvider, Credentials, Identity, PasswordAuth};
pub use config::{ServerConfig, StorageConfig, PASSWORD_ENV};
pub use error::{ServerError, ServerResult};
pub use server::CairnServer;
pub use state::AppState;
