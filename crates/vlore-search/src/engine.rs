//! Semantic search: transcript indexing, filtered ranked queries with
//! snippets, and per-sentence highlight computation.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use vlore_models::{
    format_mmss, CreatorHandle, SearchRequest, SearchResult, SearchSort, SegmentMeta,
    TranscriptArtifact, TranscriptHighlights, TranscriptSegment, VideoId,
};
use vlore_ports::Embedder;
use vlore_store::{StoreError, TopicsStore, TranscriptStore};

use crate::chunk::chunk_sentences;
use crate::error::SearchOpResult;
use crate::vector_index::VectorIndex;

/// Search tunables.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Default similarity floor for retained results
    pub min_score: f32,
    /// Per-sentence highlight threshold
    pub highlight_threshold: f32,
    /// Candidate pool fetched before filtering
    pub candidate_floor: usize,
    /// Tolerance around explicit `MM:SS` highlight stamps
    pub timestamp_tolerance_sec: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_score: 0.15,
            highlight_threshold: 0.30,
            candidate_floor: 200,
            timestamp_tolerance_sec: 5.0,
        }
    }
}

pub struct SearchEngine {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    transcripts: TranscriptStore,
    topics: TopicsStore,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        transcripts: TranscriptStore,
        topics: TopicsStore,
        config: SearchConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            transcripts,
            topics,
            config,
        }
    }

    pub fn index_handle(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Chunk, embed and append one transcript. Idempotent: a video
    /// already in the index is skipped before any embedding work.
    pub async fn index_transcript(
        &self,
        artifact: &TranscriptArtifact,
    ) -> SearchOpResult<usize> {
        let creator = &artifact.meta.creator;
        let video_id = &artifact.meta.video_id;
        if self.index.contains(creator, video_id).await {
            debug!(creator = %creator, video_id = %video_id, "already indexed, skipping");
            return Ok(0);
        }

        let chunks = chunk_sentences(&artifact.sentences);
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.encode_batch(&texts).await?;

        let now = chrono::Utc::now();
        let segments = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                (
                    SegmentMeta {
                        creator: creator.clone(),
                        video_id: video_id.clone(),
                        start_sec: chunk.start_sec,
                        end_sec: chunk.end_sec,
                        text: chunk.text,
                        indexed_at: now,
                    },
                    embedding,
                )
            })
            .collect();
        self.index.append(segments).await
    }

    /// Filtered, ranked semantic search with snippet synthesis.
    pub async fn search(&self, request: &SearchRequest) -> SearchOpResult<Vec<SearchResult>> {
        let query_embedding = self.embedder.encode(&request.query).await?;
        let pool = request.top_k.max(self.config.candidate_floor);
        let hits = self.index.search(&query_embedding, pool).await?;

        let filters = &request.filters;
        let min_score = filters.min_score.unwrap_or(self.config.min_score);
        let mut category_cache: HashMap<String, Option<String>> = HashMap::new();
        let mut tags_cache: HashMap<(String, String), Option<Vec<String>>> = HashMap::new();

        let mut retained: Vec<(SegmentMeta, f32)> = Vec::new();
        for (segment_id, score) in hits {
            if score < min_score {
                continue;
            }
            let Some(meta) = self.index.meta(segment_id).await else {
                continue;
            };
            let creator = meta.creator.as_str();

            if !filters.creators.is_empty()
                && !filters.creators.iter().any(|c| c == creator)
            {
                continue;
            }
            if filters.exclude_creators.iter().any(|c| c == creator) {
                continue;
            }
            if let Some(from) = filters.date_from {
                if meta.indexed_at < from {
                    continue;
                }
            }
            if let Some(to) = filters.date_to {
                if meta.indexed_at > to {
                    continue;
                }
            }
            if let Some(wanted) = &filters.category {
                let category = self.creator_category(&meta.creator, &mut category_cache).await;
                if category.as_deref() != Some(wanted.as_str()) {
                    continue;
                }
            }
            if !filters.required_tags.is_empty()
                && !self
                    .video_has_tag(&meta, &filters.required_tags, &mut tags_cache)
                    .await
            {
                continue;
            }
            retained.push((meta, score));
        }

        match request.sort {
            SearchSort::Relevance => {
                retained.sort_by(|a, b| b.1.total_cmp(&a.1));
            }
            SearchSort::Recency => {
                retained.sort_by(|a, b| b.0.indexed_at.cmp(&a.0.indexed_at));
            }
            SearchSort::Timestamp => {
                retained.sort_by(|a, b| a.0.start_sec.total_cmp(&b.0.start_sec));
            }
        }
        retained.truncate(request.top_k);

        let mut transcript_cache: HashMap<(String, String), Option<TranscriptArtifact>> =
            HashMap::new();
        let mut results = Vec::with_capacity(retained.len());
        for (meta, score) in retained {
            let snippet = self.snippet_for(&meta, &mut transcript_cache).await;
            let mut result = SearchResult::from_segment(&meta, score, snippet);
            if let Some(Some(category)) = category_cache.get(meta.creator.as_str()) {
                result.category = Some(category.clone());
            }
            results.push(result);
        }
        Ok(results)
    }

    /// Transcript view with semantic highlights: a sentence is marked
    /// iff its similarity to the query reaches the threshold.
    pub async fn highlight_transcript(
        &self,
        creator: &CreatorHandle,
        video_id: &VideoId,
        query: &str,
    ) -> SearchOpResult<TranscriptHighlights> {
        let artifact = self.transcripts.read(creator, video_id).await?;
        let query_embedding = self.embedder.encode(query).await?;
        let texts: Vec<String> = artifact.sentences.iter().map(|s| s.text.clone()).collect();
        let embeddings = self.embedder.encode_batch(&texts).await?;

        let segments: Vec<TranscriptSegment> = artifact
            .sentences
            .iter()
            .zip(&embeddings)
            .map(|(sentence, embedding)| {
                // Embeddings are L2-normalised, so the inner product is
                // the cosine similarity
                let similarity: f32 = query_embedding
                    .iter()
                    .zip(embedding.iter())
                    .map(|(a, b)| a * b)
                    .sum();
                to_segment(sentence, similarity >= self.config.highlight_threshold)
            })
            .collect();
        Ok(summarise(segments))
    }

    /// Transcript view with explicit timestamp highlights: a sentence is
    /// marked iff its interval overlaps any stamp within the tolerance.
    pub async fn highlight_timestamps(
        &self,
        creator: &CreatorHandle,
        video_id: &VideoId,
        stamps: &[f64],
    ) -> SearchOpResult<TranscriptHighlights> {
        let artifact = self.transcripts.read(creator, video_id).await?;
        let tolerance = self.config.timestamp_tolerance_sec;
        let segments: Vec<TranscriptSegment> = artifact
            .sentences
            .iter()
            .map(|sentence| {
                let highlighted = stamps.iter().any(|&stamp| {
                    sentence.start_sec <= stamp + tolerance
                        && sentence.end_sec >= stamp - tolerance
                });
                to_segment(sentence, highlighted)
            })
            .collect();
        Ok(summarise(segments))
    }

    /// Transcript view with no highlights.
    pub async fn plain_transcript(
        &self,
        creator: &CreatorHandle,
        video_id: &VideoId,
    ) -> SearchOpResult<TranscriptHighlights> {
        let artifact = self.transcripts.read(creator, video_id).await?;
        let segments: Vec<TranscriptSegment> = artifact
            .sentences
            .iter()
            .map(|sentence| to_segment(sentence, false))
            .collect();
        Ok(summarise(segments))
    }

    /// Disaster-recovery path: wipe the index and re-chunk every
    /// transcript on disk. Returns the number of segments indexed.
    pub async fn rebuild_from_transcripts(
        &self,
        creators: &[CreatorHandle],
    ) -> SearchOpResult<usize> {
        self.index.clear().await?;
        let mut total = 0usize;
        for creator in creators {
            for video_id in self.transcripts.list_video_ids(creator).await? {
                match self.transcripts.read(creator, &video_id).await {
                    Ok(artifact) => total += self.index_transcript(&artifact).await?,
                    Err(e) => {
                        warn!(creator = %creator, video_id = %video_id, error = %e,
                              "skipping unreadable transcript during rebuild");
                    }
                }
            }
        }
        Ok(total)
    }

    async fn creator_category(
        &self,
        creator: &CreatorHandle,
        cache: &mut HashMap<String, Option<String>>,
    ) -> Option<String> {
        if let Some(cached) = cache.get(creator.as_str()) {
            return cached.clone();
        }
        let category = match self.topics.read_category(creator).await {
            Ok(assignment) => Some(assignment.category),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => {
                warn!(creator = %creator, error = %e, "category read failed");
                None
            }
        };
        cache.insert(creator.as_str().to_string(), category.clone());
        category
    }

    async fn video_has_tag(
        &self,
        meta: &SegmentMeta,
        required: &[String],
        cache: &mut HashMap<(String, String), Option<Vec<String>>>,
    ) -> bool {
        let key = (
            meta.creator.as_str().to_string(),
            meta.video_id.as_str().to_string(),
        );
        if !cache.contains_key(&key) {
            let tags = match self.topics.read_video_tags(&meta.creator, &meta.video_id).await {
                Ok(records) => Some(
                    records
                        .into_iter()
                        .map(|r| r.canonical.to_lowercase())
                        .collect(),
                ),
                Err(StoreError::NotFound(_)) => None,
                Err(e) => {
                    warn!(error = %e, "video tag read failed");
                    None
                }
            };
            cache.insert(key.clone(), tags);
        }
        match &cache[&key] {
            Some(tags) => required
                .iter()
                .any(|r| tags.contains(&r.to_lowercase())),
            None => false,
        }
    }

    /// 2-3 sentence context window around the matched segment, falling
    /// back to the raw segment text when the transcript is unreadable.
    async fn snippet_for(
        &self,
        meta: &SegmentMeta,
        cache: &mut HashMap<(String, String), Option<TranscriptArtifact>>,
    ) -> String {
        let key = (
            meta.creator.as_str().to_string(),
            meta.video_id.as_str().to_string(),
        );
        if !cache.contains_key(&key) {
            let artifact = match self.transcripts.read(&meta.creator, &meta.video_id).await {
                Ok(artifact) => Some(artifact),
                Err(e) => {
                    warn!(error = %e, "transcript read failed during snippet synthesis");
                    None
                }
            };
            cache.insert(key.clone(), artifact);
        }
        let Some(artifact) = &cache[&key] else {
            return meta.text.clone();
        };

        let overlapping: Vec<usize> = artifact
            .sentences
            .iter()
            .filter(|s| s.end_sec > meta.start_sec && s.start_sec < meta.end_sec)
            .map(|s| s.index)
            .collect();
        let Some((&first, &last)) = overlapping.first().zip(overlapping.last()) else {
            return meta.text.clone();
        };

        // Pad a single-sentence hit with its neighbours
        let (mut from, mut to) = (first, last);
        if to - from == 0 {
            from = from.saturating_sub(1);
            to = (to + 1).min(artifact.sentences.len() - 1);
        }
        // Cap the window at three sentences around the hit
        while to - from >= 3 {
            to -= 1;
        }

        artifact.sentences[from..=to]
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn to_segment(sentence: &vlore_models::Sentence, highlighted: bool) -> TranscriptSegment {
    TranscriptSegment {
        index: sentence.index,
        start_sec: sentence.start_sec,
        end_sec: sentence.end_sec,
        timestamp: format_mmss(sentence.start_sec),
        text: sentence.text.clone(),
        highlighted,
    }
}

fn summarise(segments: Vec<TranscriptSegment>) -> TranscriptHighlights {
    let highlighted_count = segments.iter().filter(|s| s.highlighted).count();
    TranscriptHighlights {
        total_segments: segments.len(),
        highlighted_count,
        segments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;
    use vlore_models::{SearchFilters, Sentence, TranscriptMeta};
    use vlore_ports::testing::StubEmbedder;
    use vlore_store::Layout;

    async fn engine(tmp: &TempDir) -> SearchEngine {
        let layout = Layout::new(tmp.path().join("accounts"), tmp.path().join("data"));
        let embedder = Arc::new(StubEmbedder::default());
        let index = Arc::new(
            VectorIndex::load(layout.clone(), embedder.dimension())
                .await
                .unwrap(),
        );
        SearchEngine::new(
            embedder,
            index,
            TranscriptStore::new(layout.clone()),
            TopicsStore::new(layout),
            SearchConfig::default(),
        )
    }

    fn artifact(creator: &str, video: &str, text: &str) -> TranscriptArtifact {
        let sentences: Vec<Sentence> = text
            .split_inclusive('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, s)| Sentence {
                index: i,
                start_sec: i as f64 * 4.0,
                end_sec: (i + 1) as f64 * 4.0,
                text: s.to_string(),
            })
            .collect();
        TranscriptArtifact {
            meta: TranscriptMeta {
                creator: CreatorHandle::new(creator).unwrap(),
                video_id: video.into(),
                title: "t".into(),
                url: "u".into(),
                duration_sec: Some(sentences.len() as f64 * 4.0),
                language: Some("en".into()),
                confidence: Some(0.9),
                processed_at: Utc::now(),
            },
            text: text.into(),
            sentences,
        }
    }

    async fn seed(engine: &SearchEngine, creator: &str, video: &str, text: &str) {
        let art = artifact(creator, video, text);
        engine
            .transcripts
            .write(art.meta.clone(), art.text.clone(), art.sentences.clone())
            .await
            .unwrap();
        engine.index_transcript(&art).await.unwrap();
    }

    #[tokio::test]
    async fn test_index_transcript_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp).await;
        let art = artifact("alice", "v1", "Morning meditation guide. Deep breathing basics.");

        let first = engine.index_transcript(&art).await.unwrap();
        assert!(first > 0);
        let second = engine.index_transcript(&art).await.unwrap();
        assert_eq!(second, 0);
        assert_eq!(engine.index.size().await, first);
    }

    #[tokio::test]
    async fn test_search_scores_non_increasing_and_floored() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp).await;
        seed(
            &engine,
            "alice",
            "v1",
            "Morning meditation guide. Deep breathing exercises. Today we review gaming chairs.",
        )
        .await;
        seed(
            &engine,
            "bob",
            "v2",
            "Sourdough starter tips. Baking bread at home. Meditation before baking helps.",
        )
        .await;

        let request = SearchRequest {
            query: "meditation".into(),
            top_k: 10,
            filters: SearchFilters {
                min_score: Some(0.15),
                ..Default::default()
            },
            sort: SearchSort::Relevance,
        };
        let results = engine.search(&request).await.unwrap();
        assert!(!results.is_empty());
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for result in &results {
            assert!(result.score >= 0.15);
            assert!(!result.snippet.is_empty());
            assert_eq!(result.timestamp, format_mmss(result.start_sec));
        }
    }

    #[tokio::test]
    async fn test_search_creator_filters() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp).await;
        seed(&engine, "alice", "v1", "Meditation talk here.").await;
        seed(&engine, "bob", "v2", "Meditation talk there.").await;

        let request = SearchRequest {
            query: "meditation talk".into(),
            top_k: 10,
            filters: SearchFilters {
                creators: vec!["alice".into()],
                min_score: Some(0.0),
                ..Default::default()
            },
            sort: SearchSort::Relevance,
        };
        let results = engine.search(&request).await.unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.creator.as_str() == "alice"));

        let request = SearchRequest {
            query: "meditation talk".into(),
            top_k: 10,
            filters: SearchFilters {
                exclude_creators: vec!["alice".into()],
                min_score: Some(0.0),
                ..Default::default()
            },
            sort: SearchSort::Relevance,
        };
        let results = engine.search(&request).await.unwrap();
        assert!(results.iter().all(|r| r.creator.as_str() == "bob"));
    }

    #[tokio::test]
    async fn test_search_timestamp_sort() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp).await;
        seed(
            &engine,
            "alice",
            "v1",
            "Intro chatter first. Meditation content second. More meditation depth third. \
             Meditation wrap up fourth. Closing notes fifth.",
        )
        .await;

        let request = SearchRequest {
            query: "meditation".into(),
            top_k: 10,
            filters: SearchFilters {
                min_score: Some(0.0),
                ..Default::default()
            },
            sort: SearchSort::Timestamp,
        };
        let results = engine.search(&request).await.unwrap();
        for pair in results.windows(2) {
            assert!(pair[0].start_sec <= pair[1].start_sec);
        }
    }

    #[tokio::test]
    async fn test_highlight_transcript_deterministic_and_bounded() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp).await;
        seed(
            &engine,
            "alice",
            "v1",
            "Morning meditation guide. Unrelated gaming chat. Meditation breathing focus.",
        )
        .await;

        let creator = CreatorHandle::new("alice").unwrap();
        let a = engine
            .highlight_transcript(&creator, &"v1".into(), "meditation")
            .await
            .unwrap();
        let b = engine
            .highlight_transcript(&creator, &"v1".into(), "meditation")
            .await
            .unwrap();

        assert_eq!(a.total_segments, a.segments.len());
        assert!(a.highlighted_count <= a.total_segments);
        let idx = |h: &TranscriptHighlights| -> Vec<usize> {
            h.segments
                .iter()
                .filter(|s| s.highlighted)
                .map(|s| s.index)
                .collect()
        };
        assert_eq!(idx(&a), idx(&b));
    }

    #[tokio::test]
    async fn test_highlight_timestamps_tolerance() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp).await;
        seed(&engine, "alice", "v1", "One. Two. Three. Four. Five.").await;

        let creator = CreatorHandle::new("alice").unwrap();
        // Sentence 2 spans [8, 12]; stamp 15 is within 5s of it
        let highlights = engine
            .highlight_timestamps(&creator, &"v1".into(), &[15.0])
            .await
            .unwrap();
        let marked: Vec<usize> = highlights
            .segments
            .iter()
            .filter(|s| s.highlighted)
            .map(|s| s.index)
            .collect();
        assert!(marked.contains(&2));
        assert!(marked.contains(&3));
        assert!(marked.contains(&4));
        assert!(!marked.contains(&0));
    }

    #[tokio::test]
    async fn test_rebuild_matches_incremental_size() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp).await;
        seed(&engine, "alice", "v1", "Meditation first. Meditation second.").await;
        seed(&engine, "bob", "v2", "Baking first. Baking second.").await;
        let before = engine.index.size().await;

        let creators = vec![
            CreatorHandle::new("alice").unwrap(),
            CreatorHandle::new("bob").unwrap(),
        ];
        let rebuilt = engine.rebuild_from_transcripts(&creators).await.unwrap();
        assert_eq!(rebuilt, before);
        assert_eq!(engine.index.size().await, before);
    }
}
