//! Error types for the retrieval engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A term passed to a scoring function is empty or contains no
    /// normalizable characters (e.g. pure punctuation).
    #[error("bad term: {0}")]
    BadTerm(String),

    /// A document id referenced by a caller is not present in the doc map.
    #[error("unknown document: {0}")]
    UnknownDocument(u64),

    /// The on-disk cache directory, or one of its required files, is
    /// missing entirely.
    #[error("cache missing: {0}")]
    CacheMissing(String),

    /// The on-disk cache exists but its version header or fingerprint does
    /// not match the current corpus/model, so it cannot be trusted as-is.
    #[error("cache incompatible: {0}")]
    CacheIncompatible(String),

    /// An operation was attempted on an index that has not been built or
    /// loaded yet.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// Text passed to the embedder or tokenizer normalized to nothing.
    #[error("empty text")]
    EmptyText,

    /// A call into an external capability (embedding model, LLM) failed.
    #[error("external failure: {0}")]
    ExternalFailure(String),
}

impl From<bincode::Error> for RetrievalError {
    fn from(err: bincode::Error) -> Self {
        RetrievalError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RetrievalError {
    fn from(err: serde_json::Error) -> Self {
        RetrievalError::Serialization(err.to_string())
    }
}
