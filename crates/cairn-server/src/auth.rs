use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
}

impl Identity {
    pub fn anonymous() -> Self { Self { name: "anonymous".into() } }
    pub fn user(name: impl Into<String>) -> Self { Self { name: name.into() } }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Basic { user: String, password: String },
    Anonymous,
}

impl Credentials {
    /// Read credentials from an `Authorization` header value.
    ///
    /// Anything other than well-formed `Basic <base64 user:password>` is
    /// treated as anonymous.
    pub fn from_authorization(header: Option<&str>) -> Self {
        header
            .and_then(|h| h.strip_prefix("Basic "))
            .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
            .and_then(|raw| String::from_utf8(raw).ok())
            .and_then(|pair| {
                pair.split_once(':').map(|(user, password)| Self::Basic {
                    user: user.to_string(),
                    password: password.to_string(),
                })
            })
            .unwrap_or(Self::Anonymous)
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve credentials to an identity, or fail with `Unauthorized`.
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity>;
}

/// Accepts every request. Used when no password is configured.
pub struct AllowAllAuth;

#[async_trait]
impl AuthProvider for AllowAllAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity> {
        match credentials {
            Credentials::Basic { user, .. } => Ok(Identity::user(user.clone())),
            Credentials::Anonymous => Ok(Identity::anonymous()),
        }
    }
}

/// Shared-secret Basic auth: the password must match, the user name is free.
///
/// Only a digest of the secret is kept. Candidates are compared by digest,
/// and `blake3::Hash` equality is constant time.
pub struct PasswordAuth {
    digest: blake3::Hash,
}

impl PasswordAuth {
    pub fn new(password: impl AsRef<str>) -> Self {
        Self { digest: blake3::hash(password.as_ref().as_bytes()) }
    }

    fn matches(&self, candidate: &str) -> bool {
        blake3::hash(candidate.as_bytes()) == self.digest
    }
}

#[async_trait]
impl AuthProvider for PasswordAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity> {
        match credentials {
            Credentials::Basic { user, password }
                if !password.is_empty() && self.matches(password) =>
            {
                Ok(Identity::user(user.clone()))
            }
            _ => Err(ServerError::Unauthorized),
        }
    }
}

/// Middleware guarding the blob endpoints.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> ServerResult<Response> {
    let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let credentials = Credentials::from_authorization(header);
    let identity = state.auth.authenticate(&credentials).await?;
    tracing::trace!(user = %identity.name, path = %req.uri().path(), "authenticated");
    Ok(next.run(req).await)
}
