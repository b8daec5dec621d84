//! Per-creator account index: the record of what has been processed.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error_kind::ErrorKind;
use crate::ids::{CreatorHandle, VideoId};

/// Outcome of processing one video, committed after all artifacts land.
///
/// At most one record exists per video per creator; re-processing replaces
/// the whole record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessedVideoRecord {
    pub video_id: VideoId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    pub url: String,
    pub processed_at: DateTime<Utc>,
    pub success: bool,
    /// Relative path of the transcript artifact, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub transcript_length_chars: usize,
    /// Failure classification, present iff `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ProcessedVideoRecord {
    /// Build a success record for a persisted transcript.
    pub fn success(
        video_id: VideoId,
        title: impl Into<String>,
        url: impl Into<String>,
        transcript_path: impl Into<String>,
        transcript_length_chars: usize,
    ) -> Self {
        Self {
            video_id,
            title: title.into(),
            duration_sec: None,
            url: url.into(),
            processed_at: Utc::now(),
            success: true,
            transcript_path: Some(transcript_path.into()),
            transcript_length_chars,
            error_kind: None,
        }
    }

    /// Build a terminal-failure record.
    pub fn failure(
        video_id: VideoId,
        title: impl Into<String>,
        url: impl Into<String>,
        kind: ErrorKind,
    ) -> Self {
        Self {
            video_id,
            title: title.into(),
            duration_sec: None,
            url: url.into(),
            processed_at: Utc::now(),
            success: false,
            transcript_path: None,
            transcript_length_chars: 0,
            error_kind: Some(kind),
        }
    }

    pub fn with_duration(mut self, duration_sec: Option<f64>) -> Self {
        self.duration_sec = duration_sec;
        self
    }
}

/// Aggregate counters maintained on every index commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AccountStats {
    #[serde(default)]
    pub total_found: usize,
    #[serde(default)]
    pub processed: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// On-disk `index.json` for one creator.
///
/// A video id appears in `processed_videos` iff its transcript artifact
/// exists on disk or the record is a terminal failure with an error kind.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountIndexFile {
    pub creator: CreatorHandle,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Keyed by video id; BTreeMap keeps the serialised file diff-stable
    #[serde(default)]
    pub processed_videos: BTreeMap<String, ProcessedVideoRecord>,
    #[serde(default)]
    pub stats: AccountStats,
}

impl AccountIndexFile {
    /// Fresh empty index for a creator.
    pub fn new(creator: CreatorHandle) -> Self {
        let now = Utc::now();
        Self {
            creator,
            created_at: now,
            last_updated: now,
            processed_videos: BTreeMap::new(),
            stats: AccountStats::default(),
        }
    }

    /// Insert or replace a record and recompute derived counters.
    pub fn upsert(&mut self, record: ProcessedVideoRecord) {
        self.processed_videos
            .insert(record.video_id.as_str().to_string(), record);
        self.recompute_stats();
        self.last_updated = Utc::now();
    }

    /// Video ids considered done. Failures are included only on request.
    pub fn processed_ids(&self, include_failed: bool) -> Vec<VideoId> {
        self.processed_videos
            .values()
            .filter(|r| r.success || include_failed)
            .map(|r| r.video_id.clone())
            .collect()
    }

    fn recompute_stats(&mut self) {
        self.stats.processed = self.processed_videos.values().filter(|r| r.success).count();
        self.stats.failed = self.processed_videos.values().filter(|r| !r.success).count();
    }
}
