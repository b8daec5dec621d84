//! Speech transcription port.

use async_trait::async_trait;
use std::path::Path;

use vlore_models::{Sentence, WhisperMode};

use crate::error::PortResult;

/// Transcription output with per-sentence timings.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    pub sentences: Vec<Sentence>,
    pub language: Option<String>,
    /// Model self-reported confidence, 0..=1
    pub confidence: Option<f32>,
}

/// Audio-to-text engine. Capacity tiers map 1:1 to the job's
/// `whisper_mode` setting.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, tier: WhisperMode) -> PortResult<Transcription>;
}
