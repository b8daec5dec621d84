//! Vector-index segments and semantic-search request/response types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{CreatorHandle, VideoId};
use crate::timestamp::format_mmss;

/// Metadata row persisted in positional correspondence with a vector row.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SegmentMeta {
    pub creator: CreatorHandle,
    pub video_id: VideoId,
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
    /// When the segment was appended to the index
    pub indexed_at: DateTime<Utc>,
}

/// One embeddable unit of a transcript: metadata plus its dense vector.
///
/// `segment_id` is the row's positional index once appended.
#[derive(Debug, Clone)]
pub struct IndexSegment {
    pub segment_id: usize,
    pub meta: SegmentMeta,
    pub embedding: Vec<f32>,
}

/// Result ordering for semantic search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchSort {
    /// Score descending
    #[default]
    Relevance,
    /// Ingestion time descending
    Recency,
    /// Position within the video, ascending
    Timestamp,
}

/// Post-retrieval filters applied to search candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchFilters {
    /// Minimum similarity score to retain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    /// Keep only these creators (empty = all)
    #[serde(default)]
    pub creators: Vec<String>,
    /// Drop these creators
    #[serde(default)]
    pub exclude_creators: Vec<String>,
    /// Keep only creators assigned this category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Keep only videos carrying at least one of these canonical tags
    #[serde(default)]
    pub required_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
}

/// `POST /api/search/semantic` request body.
#[derive(Debug, Clone, Deserialize, JsonSchema, validator::Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, message = "query cannot be empty"))]
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub sort: SearchSort,
}

fn default_top_k() -> usize {
    10
}

/// One semantic-search hit with provenance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    pub creator: CreatorHandle,
    pub video_id: VideoId,
    pub score: f32,
    pub start_sec: f64,
    pub end_sec: f64,
    /// `MM:SS` rendering of `start_sec`
    pub timestamp: String,
    /// The matched segment text
    pub text: String,
    /// 2-3 sentence context window around the match
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SearchResult {
    /// Build a result from a segment hit, rendering the external timestamp.
    pub fn from_segment(meta: &SegmentMeta, score: f32, snippet: String) -> Self {
        Self {
            creator: meta.creator.clone(),
            video_id: meta.video_id.clone(),
            score,
            start_sec: meta.start_sec,
            end_sec: meta.end_sec,
            timestamp: format_mmss(meta.start_sec),
            text: meta.text.clone(),
            snippet,
            category: None,
        }
    }
}

/// One transcript sentence as rendered by the transcript view, with
/// its highlight flag.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub index: usize,
    pub start_sec: f64,
    pub end_sec: f64,
    /// `MM:SS` rendering of `start_sec`
    pub timestamp: String,
    pub text: String,
    pub highlighted: bool,
}

/// Transcript view with highlight summary.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptHighlights {
    pub segments: Vec<TranscriptSegment>,
    pub total_segments: usize,
    pub highlighted_count: usize,
}
