//! Per-video failure taxonomy.
//!
//! Classifies failures by behaviour: transient kinds are retried with
//! backoff inside the same pipeline run, permanent kinds fail the video
//! terminally while the rest of the account proceeds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What went wrong with a single video, by behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upstream network failure
    Network,
    /// Upstream rate limit hit
    RateLimited,
    /// Transcription exceeded its time budget
    TranscriptionTimeout,
    /// Video no longer exists upstream
    NotFound,
    /// Video requires authentication we do not have
    AuthRequired,
    /// Format or content the pipeline cannot handle
    Unsupported,
    /// Account index commit failed
    IndexWrite,
    /// Transcript artifact failed validation or parse
    CorruptTranscript,
    /// Embedding dimension disagrees with the vector index
    EmbeddingMismatch,
    /// Anything uncategorised
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::TranscriptionTimeout => "transcription_timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::IndexWrite => "index_write",
            ErrorKind::CorruptTranscript => "corrupt_transcript",
            ErrorKind::EmbeddingMismatch => "embedding_mismatch",
            ErrorKind::Internal => "internal",
        }
    }

    /// Transient failures are retried with bounded backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::RateLimited | ErrorKind::TranscriptionTimeout
        )
    }

    /// Permanent failures terminate the video immediately.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound | ErrorKind::AuthRequired | ErrorKind::Unsupported
        )
    }

    /// Data-integrity failures; an index write failure additionally fails
    /// the whole creator because further work cannot be tracked.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            ErrorKind::IndexWrite | ErrorKind::CorruptTranscript | ErrorKind::EmbeddingMismatch
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_disjoint() {
        let all = [
            ErrorKind::Network,
            ErrorKind::RateLimited,
            ErrorKind::TranscriptionTimeout,
            ErrorKind::NotFound,
            ErrorKind::AuthRequired,
            ErrorKind::Unsupported,
            ErrorKind::IndexWrite,
            ErrorKind::CorruptTranscript,
            ErrorKind::EmbeddingMismatch,
            ErrorKind::Internal,
        ];
        for kind in all {
            let classes = [kind.is_transient(), kind.is_permanent(), kind.is_integrity()];
            assert!(
                classes.iter().filter(|c| **c).count() <= 1,
                "{kind} belongs to more than one class"
            );
        }
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&ErrorKind::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
    }
}
