//! Port error types.

use thiserror::Error;
use vlore_models::ErrorKind;

pub type PortResult<T> = Result<T, PortError>;

/// Failure surfaced by an external engine.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by upstream")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("engine failure: {0}")]
    Engine(String),
}

impl PortError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Map onto the per-video failure taxonomy.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            PortError::Network(_) => ErrorKind::Network,
            PortError::RateLimited => ErrorKind::RateLimited,
            PortError::NotFound(_) => ErrorKind::NotFound,
            PortError::AuthRequired(_) => ErrorKind::AuthRequired,
            PortError::Timeout(_) => ErrorKind::TranscriptionTimeout,
            PortError::Unsupported(_) => ErrorKind::Unsupported,
            PortError::Engine(_) => ErrorKind::Internal,
        }
    }
}
