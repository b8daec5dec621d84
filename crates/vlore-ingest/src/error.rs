//! Ingestion error types.

use thiserror::Error;
use uuid::Uuid;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("job not pausable: {0}")]
    JobNotPausable(String),

    #[error("job not resumable: {0}")]
    JobNotResumable(String),

    #[error("job already terminal: {0}")]
    JobAlreadyTerminal(Uuid),

    #[error("store error: {0}")]
    Store(#[from] vlore_store::StoreError),

    #[error("search error: {0}")]
    Search(#[from] vlore_search::SearchError),

    #[error("topic error: {0}")]
    Topic(#[from] vlore_topics::TopicError),

    #[error("engine failure: {0}")]
    Port(#[from] vlore_ports::PortError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
