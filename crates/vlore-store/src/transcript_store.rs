//! Transcript artifact persistence.
//!
//! Artifacts are single JSON documents carrying the header metadata,
//! the plain-text body and the structured sentence list, so a read is
//! lossless by construction. Plain-text files from earlier tooling are
//! still readable through a sentence-estimation fallback.

use regex::Regex;
use tracing::debug;

use vlore_models::{CreatorHandle, Sentence, TranscriptArtifact, TranscriptMeta, VideoId};

use crate::error::{StoreError, StoreResult};
use crate::layout::{write_json_atomic, Layout};

#[derive(Debug, Clone)]
pub struct TranscriptStore {
    layout: Layout,
}

impl TranscriptStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Persist a transcript artifact. Returns the index-relative path
    /// and the body length in chars.
    pub async fn write(
        &self,
        meta: TranscriptMeta,
        body: String,
        sentences: Vec<Sentence>,
    ) -> StoreResult<(String, usize)> {
        let artifact = TranscriptArtifact {
            meta,
            text: body,
            sentences,
        };
        artifact
            .validate()
            .map_err(|e| StoreError::CorruptTranscript(e.to_string()))?;

        let path = self
            .layout
            .transcript_path(&artifact.meta.creator, &artifact.meta.video_id);
        write_json_atomic(&path, &artifact).await?;
        debug!(
            creator = %artifact.meta.creator,
            video_id = %artifact.meta.video_id,
            chars = artifact.length_chars(),
            "transcript persisted"
        );
        Ok((
            self.layout
                .transcript_rel_path(&artifact.meta.creator, &artifact.meta.video_id),
            artifact.length_chars(),
        ))
    }

    /// Read a transcript artifact.
    ///
    /// A file that is not the structured JSON form is treated as a
    /// legacy plain-text transcript: sentences are estimated from the
    /// body with timings distributed proportional to character counts.
    pub async fn read(
        &self,
        creator: &CreatorHandle,
        video_id: &VideoId,
    ) -> StoreResult<TranscriptArtifact> {
        let path = self.layout.transcript_path(creator, video_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(format!(
                    "transcript for {creator}/{video_id}"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if let Ok(artifact) = serde_json::from_slice::<TranscriptArtifact>(&bytes) {
            artifact
                .validate()
                .map_err(|e| StoreError::CorruptTranscript(e.to_string()))?;
            return Ok(artifact);
        }

        // Legacy plain-text artifact
        let text = String::from_utf8(bytes)
            .map_err(|e| StoreError::CorruptTranscript(e.to_string()))?;
        debug!(creator = %creator, video_id = %video_id, "legacy transcript, estimating sentence timings");
        let sentences = parse_sentences(&text, None);
        Ok(TranscriptArtifact {
            meta: TranscriptMeta {
                creator: creator.clone(),
                video_id: video_id.clone(),
                title: String::new(),
                url: String::new(),
                duration_sec: None,
                language: None,
                confidence: None,
                processed_at: chrono::Utc::now(),
            },
            text,
            sentences,
        })
    }

    /// Whether a transcript artifact exists for this video.
    pub async fn exists(&self, creator: &CreatorHandle, video_id: &VideoId) -> bool {
        tokio::fs::try_exists(self.layout.transcript_path(creator, video_id))
            .await
            .unwrap_or(false)
    }

    /// Video ids with a transcript artifact on disk.
    pub async fn list_video_ids(&self, creator: &CreatorHandle) -> StoreResult<Vec<VideoId>> {
        let dir = self.layout.transcriptions_dir(creator);
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix("_transcript.json") {
                ids.push(stem.into());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Split a plain-text body into sentences, distributing timings
/// proportional to character counts over the total duration.
///
/// Fallback for legacy artifacts only; newly written transcripts carry
/// real timings from the transcriber.
pub fn parse_sentences(body: &str, duration_sec: Option<f64>) -> Vec<Sentence> {
    let splitter = Regex::new(r"[^.!?\n]+[.!?]*").expect("static regex");
    let pieces: Vec<&str> = splitter
        .find_iter(body)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();

    let total_chars: usize = pieces.iter().map(|s| s.chars().count()).sum();
    if total_chars == 0 {
        return Vec::new();
    }
    // Without a known duration, estimate from speaking rate (~15 chars/sec).
    let duration = duration_sec.unwrap_or(total_chars as f64 / 15.0);

    let mut sentences = Vec::with_capacity(pieces.len());
    let mut consumed = 0usize;
    for piece in pieces {
        let chars = piece.chars().count();
        let start_sec = duration * consumed as f64 / total_chars as f64;
        consumed += chars;
        let end_sec = duration * consumed as f64 / total_chars as f64;
        sentences.push(Sentence {
            index: sentences.len(),
            start_sec,
            end_sec,
            text: piece.to_string(),
        });
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TranscriptStore, CreatorHandle) {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("accounts"), tmp.path().join("data"));
        (
            tmp,
            TranscriptStore::new(layout),
            CreatorHandle::new("tester").unwrap(),
        )
    }

    fn meta(creator: &CreatorHandle, video_id: &str) -> TranscriptMeta {
        TranscriptMeta {
            creator: creator.clone(),
            video_id: video_id.into(),
            title: "a video".into(),
            url: "https://v/x".into(),
            duration_sec: Some(30.0),
            language: Some("en".into()),
            confidence: Some(0.9),
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (_tmp, store, creator) = setup();
        let sentences = vec![
            Sentence {
                index: 0,
                start_sec: 0.0,
                end_sec: 3.0,
                text: "Hello there.".into(),
            },
            Sentence {
                index: 1,
                start_sec: 3.0,
                end_sec: 6.5,
                text: "Welcome back.".into(),
            },
        ];
        let (rel, chars) = store
            .write(
                meta(&creator, "v1"),
                "Hello there. Welcome back.".into(),
                sentences.clone(),
            )
            .await
            .unwrap();
        assert_eq!(rel, "tester/transcriptions/v1_transcript.json");
        assert_eq!(chars, 26);

        let artifact = store.read(&creator, &"v1".into()).await.unwrap();
        assert_eq!(artifact.sentences, sentences);
        assert_eq!(artifact.meta.language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_write_rejects_invalid_sentences() {
        let (_tmp, store, creator) = setup();
        let bad = vec![Sentence {
            index: 0,
            start_sec: 9.0,
            end_sec: 1.0,
            text: "x".into(),
        }];
        let result = store.write(meta(&creator, "v1"), "x".into(), bad).await;
        assert!(matches!(result, Err(StoreError::CorruptTranscript(_))));
        assert!(!store.exists(&creator, &"v1".into()).await);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_tmp, store, creator) = setup();
        assert!(matches!(
            store.read(&creator, &"nope".into()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_plain_text_fallback() {
        let (_tmp, store, creator) = setup();
        let path = store.layout.transcript_path(&creator, &"old".into());
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, "First sentence. Second sentence. Third.")
            .await
            .unwrap();

        let artifact = store.read(&creator, &"old".into()).await.unwrap();
        assert_eq!(artifact.sentences.len(), 3);
        assert!(artifact.validate().is_ok());
    }

    #[tokio::test]
    async fn test_list_video_ids() {
        let (_tmp, store, creator) = setup();
        store
            .write(meta(&creator, "b"), "Some words here.".into(), parse_sentences("Some words here.", Some(3.0)))
            .await
            .unwrap();
        store
            .write(meta(&creator, "a"), "Other words here.".into(), parse_sentences("Other words here.", Some(3.0)))
            .await
            .unwrap();
        let ids = store.list_video_ids(&creator).await.unwrap();
        assert_eq!(ids, vec![VideoId::from("a"), VideoId::from("b")]);
    }

    #[test]
    fn test_parse_sentences_proportional_timing() {
        let sentences = parse_sentences("Short. A much longer sentence here.", Some(10.0));
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].start_sec, 0.0);
        assert!((sentences[1].end_sec - 10.0).abs() < 1e-9);
        // The longer sentence gets the larger share
        let first = sentences[0].end_sec - sentences[0].start_sec;
        let second = sentences[1].end_sec - sentences[1].start_sec;
        assert!(second > first);
        // Contiguous coverage
        assert_eq!(sentences[0].end_sec, sentences[1].start_sec);
    }

    #[test]
    fn test_parse_sentences_empty() {
        assert!(parse_sentences("", Some(10.0)).is_empty());
        assert!(parse_sentences("   \n", None).is_empty());
    }
}
