//! Transcript artifacts with per-sentence timings.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{CreatorHandle, VideoId};

/// One sentence of speech with its interval in the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Sentence {
    /// Position in the transcript, contiguous from 0
    pub index: usize,
    /// Offset of the first word, seconds from video start
    pub start_sec: f64,
    /// Offset of the last word, seconds from video start
    pub end_sec: f64,
    pub text: String,
}

/// Header metadata persisted alongside the transcript body.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptMeta {
    pub creator: CreatorHandle,
    pub video_id: VideoId,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Transcriber self-reported confidence, 0..=1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub processed_at: DateTime<Utc>,
}

/// Violation of the sentence invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranscriptInvariantError {
    #[error("sentence {index}: start {start_sec} is after end {end_sec}")]
    StartAfterEnd {
        index: usize,
        start_sec: f64,
        end_sec: f64,
    },
    #[error("sentence at position {position} has index {index}, expected contiguous from 0")]
    NonContiguousIndex { position: usize, index: usize },
}

/// A complete transcript: plain text body plus ordered timed sentences.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptArtifact {
    pub meta: TranscriptMeta,
    /// Full plain-text body
    pub text: String,
    /// Ordered sentences; indices contiguous from 0, start <= end
    pub sentences: Vec<Sentence>,
}

impl TranscriptArtifact {
    /// Check the sentence invariants.
    pub fn validate(&self) -> Result<(), TranscriptInvariantError> {
        for (position, sentence) in self.sentences.iter().enumerate() {
            if sentence.index != position {
                return Err(TranscriptInvariantError::NonContiguousIndex {
                    position,
                    index: sentence.index,
                });
            }
            if sentence.start_sec > sentence.end_sec {
                return Err(TranscriptInvariantError::StartAfterEnd {
                    index: sentence.index,
                    start_sec: sentence.start_sec,
                    end_sec: sentence.end_sec,
                });
            }
        }
        Ok(())
    }

    /// Character length of the body, the speech-presence signal.
    pub fn length_chars(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(sentences: Vec<Sentence>) -> TranscriptArtifact {
        TranscriptArtifact {
            meta: TranscriptMeta {
                creator: CreatorHandle::new("t").unwrap(),
                video_id: "v".into(),
                title: "t".into(),
                url: "u".into(),
                duration_sec: Some(60.0),
                language: Some("en".into()),
                confidence: Some(0.9),
                processed_at: Utc::now(),
            },
            text: "hello world".into(),
            sentences,
        }
    }

    #[test]
    fn test_validate_ok() {
        let a = artifact(vec![
            Sentence {
                index: 0,
                start_sec: 0.0,
                end_sec: 2.0,
                text: "hello".into(),
            },
            Sentence {
                index: 1,
                start_sec: 2.0,
                end_sec: 4.0,
                text: "world".into(),
            },
        ]);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_interval() {
        let a = artifact(vec![Sentence {
            index: 0,
            start_sec: 5.0,
            end_sec: 2.0,
            text: "x".into(),
        }]);
        assert!(matches!(
            a.validate(),
            Err(TranscriptInvariantError::StartAfterEnd { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_gap_in_indices() {
        let a = artifact(vec![Sentence {
            index: 1,
            start_sec: 0.0,
            end_sec: 1.0,
            text: "x".into(),
        }]);
        assert!(matches!(
            a.validate(),
            Err(TranscriptInvariantError::NonContiguousIndex { .. })
        ));
    }
}
