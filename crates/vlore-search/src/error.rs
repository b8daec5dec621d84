//! Search and index error types.

use thiserror::Error;

/// Result alias for index and search operations. Named to stay clear
/// of the `SearchResult` wire type.
pub type SearchOpResult<T> = Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("engine failure: {0}")]
    Port(#[from] vlore_ports::PortError),

    #[error("store error: {0}")]
    Store(#[from] vlore_store::StoreError),

    #[error("embedding dimension {got} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("corrupt vector index: {0}")]
    Corrupt(String),
}
