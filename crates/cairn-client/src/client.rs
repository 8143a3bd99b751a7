use std::path::Path;

use cairn_crypto::BlobHasher;
use cairn_protocol::{
    endpoints, params, ErrorResponse, PreUploadResponse, UploadResponse, PROTOCOL_VERSION,
};
use cairn_types::{BlobRef, HashAlgorithm, SizedBlobRef};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tokio::io::AsyncReadExt;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_SERVER: &str = "http://localhost:3179";

/// User name sent with Basic auth. The server only checks the password.
const BASIC_USER: &str = "cairn";
const READ_CHUNK: usize = 64 * 1024;

/// What happened to a file handed to [`CairnClient::upload_file`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(SizedBlobRef),
    /// `preupload` reported the blob as already stored.
    AlreadyHad(SizedBlobRef),
}

impl UploadOutcome {
    pub fn sized(&self) -> &SizedBlobRef {
        match self {
            Self::Uploaded(s) | Self::AlreadyHad(s) => s,
        }
    }
}

/// Client for one Cairn server.
#[derive(Clone, Debug)]
pub struct CairnClient {
    base: String,
    password: Option<String>,
    http: reqwest::Client,
}

impl CairnClient {
    /// `server` is the base URL, e.g. `http://localhost:3179`.
    pub fn new(server: impl Into<String>) -> ClientResult<Self> {
        let base = server.into().trim_end_matches('/').to_string();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(base));
        }
        Ok(Self {
            base,
            password: None,
            http: reqwest::Client::new(),
        })
    }

    /// Send Basic credentials with every request. Empty means none.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn server(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base)
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.password {
            Some(pw) => req.basic_auth(BASIC_USER, Some(pw)),
            None => req,
        }
    }

    /// Ask which of `refs` the server already stores.
    pub async fn preupload(&self, refs: &[BlobRef]) -> ClientResult<PreUploadResponse> {
        let mut form = vec![(params::CAMLI_VERSION.to_string(), PROTOCOL_VERSION.to_string())];
        form.extend(refs.iter().enumerate().map(|(i, r)| {
            (format!("{}{}", params::PREUPLOAD_BLOB_PREFIX, i + 1), r.to_string())
        }));
        let resp = self
            .request(Method::POST, &self.url(endpoints::PREUPLOAD))
            .form(&form)
            .send()
            .await?;
        Ok(success(resp).await?.json().await?)
    }

    /// Whether the server stores `blob_ref`.
    pub async fn check(&self, blob_ref: &BlobRef) -> ClientResult<bool> {
        let resp = self
            .request(Method::GET, &self.url(endpoints::CHECK))
            .query(&[(params::BLOB_REF, blob_ref.to_string())])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        success(resp).await?;
        Ok(true)
    }

    /// Hash `path`, then upload it unless the server already has it.
    ///
    /// The file is streamed from disk in both passes.
    pub async fn upload_file(
        &self,
        path: &Path,
        algorithm: HashAlgorithm,
    ) -> ClientResult<UploadOutcome> {
        let blob_ref = hash_file(path, algorithm).await?;
        let pre = self.preupload(std::slice::from_ref(&blob_ref)).await?;
        if let Some(have) = pre.already_have.into_iter().find(|s| s.blob_ref == blob_ref) {
            tracing::debug!(%blob_ref, "server already has blob");
            return Ok(UploadOutcome::AlreadyHad(have));
        }

        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        if size > pre.max_upload_size {
            return Err(ClientError::TooLarge {
                size,
                max: pre.max_upload_size,
            });
        }
        let part = Part::stream_with_length(file, size)
            .file_name(blob_ref.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part(blob_ref.to_string(), part);

        let resp = self
            .request(Method::POST, &self.url(&pre.upload_url))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = success(resp).await?.json().await?;
        tracing::debug!(%blob_ref, size, "uploaded blob");
        body.received
            .into_iter()
            .find(|s| s.blob_ref == blob_ref)
            .map(UploadOutcome::Uploaded)
            .ok_or(ClientError::NotAccepted(blob_ref))
    }
}

/// Pass 2xx responses through; turn anything else into an error.
async fn success(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }
    let message = match resp.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
    };
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Blob ref of a file's contents, read in fixed-size chunks.
pub async fn hash_file(path: &Path, algorithm: HashAlgorithm) -> ClientResult<BlobRef> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = BlobHasher::new(algorithm);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use cairn_server::{CairnServer, ServerConfig};
    use cairn_store::{BlobStore, InMemoryBlobStore};
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    const HELLO_REF: &str = "sha1-aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    async fn spawn_server(config: ServerConfig) -> (Arc<InMemoryBlobStore>, SocketAddr) {
        let store = Arc::new(InMemoryBlobStore::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = CairnServer::with_store(store.clone(), config);
        tokio::spawn(server.serve_on(listener, std::future::pending()));
        (store, addr)
    }

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            CairnClient::new("localhost:3179"),
            Err(ClientError::InvalidUrl(_))
        ));
        let client = CairnClient::new("http://blobs.example/").unwrap();
        assert_eq!(client.server(), "http://blobs.example");
        assert_eq!(client.url("/upload"), "http://blobs.example/upload");
        assert_eq!(client.url("http://other:1/upload"), "http://other:1/upload");
    }

    #[tokio::test]
    async fn hash_file_matches_one_shot_digest() {
        let dir = TempDir::new().unwrap();
        let data = vec![5u8; READ_CHUNK * 3 + 1];
        let path = write_file(&dir, "big.bin", &data);
        let r = hash_file(&path, HashAlgorithm::Blake3).await.unwrap();
        assert_eq!(r, BlobHasher::digest(HashAlgorithm::Blake3, &data));
    }

    #[tokio::test]
    async fn upload_then_already_had() {
        let (store, addr) = spawn_server(ServerConfig::default()).await;
        let client = CairnClient::new(format!("http://{addr}")).unwrap();
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hello.txt", b"hello");

        let outcome = client.upload_file(&path, HashAlgorithm::Sha1).await.unwrap();
        assert!(matches!(outcome, UploadOutcome::Uploaded(_)));
        assert_eq!(outcome.sized().blob_ref.to_string(), HELLO_REF);
        assert_eq!(outcome.sized().size, 5);

        let r = BlobRef::parse(HELLO_REF).unwrap();
        assert_eq!(store.get(&r).unwrap().as_ref(), b"hello");
        assert!(client.check(&r).await.unwrap());

        let again = client.upload_file(&path, HashAlgorithm::Sha1).await.unwrap();
        assert!(matches!(again, UploadOutcome::AlreadyHad(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn preupload_reports_only_stored_refs() {
        let (_, addr) = spawn_server(ServerConfig::default()).await;
        let client = CairnClient::new(format!("http://{addr}")).unwrap();
        let absent = BlobHasher::digest(HashAlgorithm::Sha256, b"absent");
        assert!(!client.check(&absent).await.unwrap());

        let pre = client.preupload(&[absent]).await.unwrap();
        assert!(pre.already_have.is_empty());
        assert_eq!(pre.upload_url, format!("http://{addr}/upload"));
    }

    #[tokio::test]
    async fn uploads_multi_chunk_file() {
        let (store, addr) = spawn_server(ServerConfig::default()).await;
        let client = CairnClient::new(format!("http://{addr}")).unwrap();
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 241) as u8).collect();
        let path = write_file(&dir, "big.bin", &data);

        let outcome = client.upload_file(&path, HashAlgorithm::Sha256).await.unwrap();
        assert_eq!(outcome.sized().size, data.len() as u64);
        assert_eq!(store.get(&outcome.sized().blob_ref).unwrap().len(), data.len());
    }

    #[tokio::test]
    async fn password_is_required_when_configured() {
        let config = ServerConfig {
            password: Some("pw".into()),
            ..ServerConfig::default()
        };
        let (store, addr) = spawn_server(config).await;
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hello.txt", b"hello");

        let anonymous = CairnClient::new(format!("http://{addr}")).unwrap();
        assert!(matches!(
            anonymous.upload_file(&path, HashAlgorithm::Sha1).await,
            Err(ClientError::Unauthorized)
        ));
        let wrong = anonymous.clone().with_password(Some("nope".into()));
        assert!(matches!(
            wrong.upload_file(&path, HashAlgorithm::Sha1).await,
            Err(ClientError::Unauthorized)
        ));
        assert!(store.is_empty());

        let authed = anonymous.with_password(Some("pw".into()));
        authed.upload_file(&path, HashAlgorithm::Sha1).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
