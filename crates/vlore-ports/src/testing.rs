//! Deterministic in-memory engines for tests.
//!
//! These fakes are pure functions of their inputs so scenario tests are
//! reproducible run to run: the embedder hashes tokens into a fixed
//! low-dimension space, the transcriber replays scripted transcripts and
//! the noun-phrase engine is a small stopword chunker.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use vlore_models::{CreatorHandle, Sentence, VideoMeta, WhisperMode};

use crate::embedder::Embedder;
use crate::error::{PortError, PortResult};
use crate::nlp::{NounPhrase, NounPhraseEngine};
use crate::transcriber::{Transcriber, Transcription};
use crate::video_source::VideoSource;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Token-hashing embedder with a fixed dimension.
///
/// Texts sharing vocabulary land close in the space, which is enough for
/// similarity, MMR and clustering behaviour to be observable in tests.
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash & (1 << 32) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn encode(&self, text: &str) -> PortResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Scripted platform source backed by in-memory listings.
#[derive(Default)]
pub struct FakeVideoSource {
    videos: HashMap<String, Vec<VideoMeta>>,
    /// Remaining scripted download failures per video URL
    failures: Mutex<HashMap<String, usize>>,
}

impl FakeVideoSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_videos(mut self, creator: &str, videos: Vec<VideoMeta>) -> Self {
        self.videos.insert(creator.to_string(), videos);
        self
    }

    /// Make the next `count` downloads of `url` fail with a network error.
    pub fn fail_downloads(self, url: &str, count: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), count);
        self
    }
}

#[async_trait]
impl VideoSource for FakeVideoSource {
    async fn list_videos(&self, creator: &CreatorHandle) -> PortResult<Vec<VideoMeta>> {
        Ok(self
            .videos
            .get(creator.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn download_audio(
        &self,
        video_url: &str,
        destination: &Path,
        _auth_cookies: Option<&Path>,
    ) -> PortResult<PathBuf> {
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(video_url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(PortError::network(format!(
                        "scripted failure for {video_url}"
                    )));
                }
            }
        }
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|e| PortError::engine(e.to_string()))?;
        let path = destination.join("audio.m4a");
        tokio::fs::write(&path, b"fake audio")
            .await
            .map_err(|e| PortError::engine(e.to_string()))?;
        Ok(path)
    }
}

/// Build a timed transcription from plain text, 3 seconds per sentence.
pub fn transcription_from_text(text: &str) -> Transcription {
    let mut sentences = Vec::new();
    let mut cursor = 0.0f64;
    for chunk in text
        .split_inclusive(['.', '?', '!'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sentences.push(Sentence {
            index: sentences.len(),
            start_sec: cursor,
            end_sec: cursor + 3.0,
            text: chunk.to_string(),
        });
        cursor += 3.0;
    }
    Transcription {
        text: text.to_string(),
        sentences,
        language: Some("en".to_string()),
        confidence: Some(0.92),
    }
}

/// Scripted transcriber keyed by a video id appearing in the audio path.
#[derive(Default)]
pub struct FakeTranscriber {
    scripts: Vec<(String, String)>,
    default_text: Option<String>,
}

impl FakeTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the transcript text returned for any audio path that
    /// contains `video_id`.
    pub fn with_script(mut self, video_id: &str, text: &str) -> Self {
        self.scripts.push((video_id.to_string(), text.to_string()));
        self
    }

    /// Fallback transcript for unscripted videos.
    pub fn with_default_text(mut self, text: &str) -> Self {
        self.default_text = Some(text.to_string());
        self
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path, _tier: WhisperMode) -> PortResult<Transcription> {
        let path = audio_path.to_string_lossy();
        for (video_id, text) in &self.scripts {
            if path.contains(video_id.as_str()) {
                return Ok(transcription_from_text(text));
            }
        }
        match &self.default_text {
            Some(text) => Ok(transcription_from_text(text)),
            None => Ok(transcription_from_text("")),
        }
    }
}

const CHUNKER_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "how",
    "i", "if", "in", "is", "it", "its", "just", "me", "my", "no", "not", "of", "on", "or", "our",
    "out", "so", "that", "the", "their", "them", "then", "there", "these", "they", "this", "to",
    "up", "us", "was", "we", "were", "what", "when", "where", "which", "who", "will", "with",
    "you", "your",
];

/// Stopword chunker standing in for a real noun-phrase engine.
///
/// Yields maximal runs of up to three consecutive non-stopword tokens,
/// lemma = lowercased surface form.
#[derive(Default)]
pub struct FakeNounPhrases;

impl FakeNounPhrases {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NounPhraseEngine for FakeNounPhrases {
    async fn noun_phrases(&self, text: &str) -> PortResult<Vec<NounPhrase>> {
        fn flush(run: &mut Vec<(usize, String)>, phrases: &mut Vec<NounPhrase>) {
            for window in run.chunks(3) {
                let start_char = window[0].0;
                let (last_start, last) = &window[window.len() - 1];
                let end_char = last_start + last.chars().count();
                let surface = window
                    .iter()
                    .map(|(_, w)| w.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                phrases.push(NounPhrase {
                    lemma: surface.to_lowercase(),
                    text: surface,
                    start_char,
                    end_char,
                });
            }
            run.clear();
        }

        let mut phrases = Vec::new();
        let mut run: Vec<(usize, String)> = Vec::new();
        let mut word_start = 0usize;
        let mut in_word = false;
        let chars: Vec<char> = text.chars().collect();

        for (i, c) in chars.iter().enumerate() {
            if c.is_alphanumeric() || *c == '\'' {
                if !in_word {
                    word_start = i;
                    in_word = true;
                }
            } else if in_word {
                let word: String = chars[word_start..i].iter().collect();
                if CHUNKER_STOPWORDS.contains(&word.to_lowercase().as_str()) {
                    flush(&mut run, &mut phrases);
                } else {
                    run.push((word_start, word));
                }
                in_word = false;
            }
        }
        if in_word {
            let word: String = chars[word_start..].iter().collect();
            if !CHUNKER_STOPWORDS.contains(&word.to_lowercase().as_str()) {
                run.push((word_start, word));
            }
        }
        flush(&mut run, &mut phrases);

        Ok(phrases)
    }
}
