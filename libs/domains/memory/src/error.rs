use std::time::Duration;

use thiserror::Error;

use crate::decoder::DecodeError;
use crate::payload::PayloadError;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// The index could not be reached or the collection could not be prepared.
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Embedding provider rate limited: {0}")]
    RateLimited(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Embedding provider returned an empty vector")]
    EmptyEmbedding,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Worker failed: {0}")]
    Worker(String),
}

pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Failures worth retrying after a pause.
    pub fn is_transient(&self) -> bool {
        match self {
            MemoryError::Timeout { .. }
            | MemoryError::RateLimited(_)
            | MemoryError::Transport(_) => true,
            MemoryError::Provider { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<qdrant_client::QdrantError> for MemoryError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        MemoryError::Index(err.to_string())
    }
}

impl From<reqwest::Error> for MemoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MemoryError::Embedding(format!("invalid response body: {}", err))
        } else {
            MemoryError::Transport(err.to_string())
        }
    }
}

impl From<core_config::ConfigError> for MemoryError {
    fn from(err: core_config::ConfigError) -> Self {
        MemoryError::Config(err.to_string())
    }
}
