//! Store error types.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("account index write failed: {0}")]
    IndexWrite(String),

    #[error("corrupt account index for {creator}: {reason}")]
    CorruptIndex { creator: String, reason: String },

    #[error("corrupt transcript: {0}")]
    CorruptTranscript(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn index_write(msg: impl Into<String>) -> Self {
        Self::IndexWrite(msg.into())
    }
}
