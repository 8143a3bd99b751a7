use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cairn_protocol::MAX_UPLOAD_SIZE;
use cairn_store::{BlobStore, FilesystemBlobStore, InMemoryBlobStore, DEFAULT_LIST_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Environment variable that overrides [`ServerConfig::password`].
pub const PASSWORD_ENV: &str = "CAIRN_PASSWORD";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    /// Largest request body accepted by `put` and `upload`.
    pub max_upload_size: u64,
    /// Page size cap for `list`.
    pub list_limit: usize,
    /// Shared secret for HTTP Basic auth. `None` disables authentication.
    pub password: Option<String>,
    /// Answer `/` with a bare greeting instead of naming the server.
    pub stealth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3179)),
            storage: StorageConfig::default(),
            max_upload_size: MAX_UPLOAD_SIZE,
            list_limit: DEFAULT_LIST_LIMIT,
            password: None,
            stealth: true,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Apply `CAIRN_PASSWORD` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_password_override(std::env::var(PASSWORD_ENV).ok())
    }

    /// The password guarding the blob endpoints. An empty one disables auth.
    pub fn active_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Replace the password when `password` is set and non-empty.
    pub fn with_password_override(mut self, password: Option<String>) -> Self {
        if let Some(p) = password.filter(|p| !p.is_empty()) {
            self.password = Some(p);
        }
        self
    }
}

/// Which backend holds the blobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Filesystem { root: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            root: PathBuf::from("/tmp/cairnroot"),
        }
    }
}

impl StorageConfig {
    /// Open the configured store. A filesystem root must already exist.
    pub fn open(&self) -> ServerResult<Arc<dyn BlobStore>> {
        Ok(match self {
            Self::Memory => Arc::new(InMemoryBlobStore::new()),
            Self::Filesystem { root } => Arc::new(FilesystemBlobStore::open(root)?),
        })
    }
}
