use cairn_types::BlobRef;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server rejected the credentials")]
    Unauthorized,

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("server did not report receiving {0}")]
    NotAccepted(BlobRef),

    #[error("blob of {size} bytes exceeds the server limit of {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;
