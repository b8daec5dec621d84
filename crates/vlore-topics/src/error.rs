//! Topic pipeline error types.

use thiserror::Error;
use vlore_ports::PortError;

pub type TopicResult<T> = Result<T, TopicError>;

#[derive(Debug, Error)]
pub enum TopicError {
    #[error("engine failure: {0}")]
    Port(#[from] PortError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl TopicError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
