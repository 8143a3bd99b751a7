use thiserror::Error;

/// Errors produced while parsing or building a blob reference.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefError {
    #[error("malformed blob ref: {0:?}")]
    Malformed(String),

    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid {algorithm} digest length: expected {expected} hex chars, got {actual}")]
    InvalidDigestLength {
        algorithm: String,
        expected: usize,
        actual: usize,
    },
}
