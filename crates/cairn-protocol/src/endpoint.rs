/// HTTP endpoint paths served by Cairn.
pub mod endpoints {
    pub const ROOT: &str = "/";
    pub const PUT: &str = "/put";
    pub const GET: &str = "/get";
    pub const CHECK: &str = "/check";
    pub const LIST: &str = "/list";
    pub const PREUPLOAD: &str = "/preupload";
    pub const UPLOAD: &str = "/upload";
    pub const HEALTH: &str = "/health";
}

/// Request parameter and form field names.
pub mod params {
    pub const FILE: &str = "file";
    pub const BLOB_REF: &str = "blob_ref";
    pub const AFTER_BLOB_REF: &str = "after_blob_ref";
    pub const LIMIT: &str = "limit";
    pub const CAMLI_VERSION: &str = "camliversion";
    /// Preupload refs are sent as `blob1`, `blob2`, ... up to the first gap.
    pub const PREUPLOAD_BLOB_PREFIX: &str = "blob";
}

/// Health check response.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
        }
    }
}
