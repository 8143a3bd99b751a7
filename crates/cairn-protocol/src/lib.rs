//! HTTP protocol for Cairn.
//!
//! Defines the endpoint paths, request parameters, and JSON bodies shared
//! by the Cairn server and its clients. Response bodies use camelCase keys.

pub mod endpoint;
pub mod error;
pub mod message;

pub use endpoint::{endpoints, params, HealthResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    BlobRefQuery, CheckResponse, ErrorResponse, ListQuery, ListResponse, PreUploadRequest,
    PreUploadResponse, UploadResponse, MAX_UPLOAD_SIZE, PROTOCOL_VERSION,
    UPLOAD_URL_EXPIRATION_SECS,
};
