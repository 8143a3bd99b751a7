use cairn_types::RefError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("bogus blob ref for {key}: {source}")]
    InvalidRef {
        key: String,
        #[source]
        source: RefError,
    },

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
