use std::sync::Arc;

use cairn_store::{BlobStore, StoreResult};

use crate::auth::{AllowAllAuth, AuthProvider, PasswordAuth};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build state for `config`, picking the auth provider from its password.
    pub fn new(store: Arc<dyn BlobStore>, config: ServerConfig) -> Self {
        let auth: Arc<dyn AuthProvider> = match config.active_password() {
            Some(pw) => Arc::new(PasswordAuth::new(pw)),
            None => Arc::new(AllowAllAuth),
        };
        Self {
            store,
            auth,
            config: Arc::new(config),
        }
    }

    /// Run a store operation on the blocking pool.
    pub async fn with_store<T, F>(&self, op: F) -> ServerResult<T>
    where
        F: FnOnce(&dyn BlobStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        Self::blocking(move || op(store.as_ref())).await
    }

    /// Run blocking store work that does not need the store handle itself.
    pub async fn blocking<T, F>(op: F) -> ServerResult<T>
    where
        F: FnOnce() -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(op)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?
            .map_err(ServerError::from)
    }
}
