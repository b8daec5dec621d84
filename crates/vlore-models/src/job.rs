//! Ingestion jobs: requests, filters, settings and progress snapshots.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ids::{CreatorHandle, VideoId};

/// Transcriber capacity tier selected per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum WhisperMode {
    Fast,
    #[default]
    Balanced,
    Accurate,
    Ultra,
}

impl WhisperMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperMode::Fast => "fast",
            WhisperMode::Balanced => "balanced",
            WhisperMode::Accurate => "accurate",
            WhisperMode::Ultra => "ultra",
        }
    }
}

/// Filters applied to a creator's metadata list before downloading.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct IngestFilters {
    /// Keep only the last N videos of the listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_n_videos: Option<usize>,
    /// Positional slice start, 0..=1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_start: Option<f64>,
    /// Positional slice end, 0..=1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
    /// Drop creators whose assigned category differs; skipped while unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_category: Option<String>,
    /// Post-extraction filter: retain videos carrying at least one tag
    #[serde(default)]
    pub required_tags: Vec<String>,
    /// Drop videos whose transcript is below the speech minimum
    #[serde(default)]
    pub only_with_speech: bool,
}

/// Per-job settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IngestSettings {
    #[serde(default)]
    pub whisper_mode: WhisperMode,
    /// Idempotency gate: skip videos already in the account index
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    /// Re-drive processed videos whose stored confidence is low
    #[serde(default)]
    pub retranscribe_low_confidence: bool,
    /// Hard skip for videos longer than this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration_minutes: Option<f64>,
    /// Videos processed concurrently within a creator
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            whisper_mode: WhisperMode::default(),
            skip_existing: true,
            retranscribe_low_confidence: false,
            max_duration_minutes: None,
            concurrency: 1,
        }
    }
}

/// `POST /api/ingest/start` request body.
#[derive(Debug, Clone, Deserialize, JsonSchema, validator::Validate)]
pub struct IngestRequest {
    #[validate(length(min = 1, message = "usernames cannot be empty"))]
    pub usernames: Vec<String>,
    #[serde(default)]
    pub filters: IngestFilters,
    #[serde(default)]
    pub settings: IngestSettings,
}

/// Job lifecycle status, also used per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    FetchingMetadata,
    Filtering,
    Downloading,
    Transcribing,
    ExtractingTopics,
    Embedding,
    Complete,
    Failed,
    Paused,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::FetchingMetadata => "fetching_metadata",
            JobStatus::Filtering => "filtering",
            JobStatus::Downloading => "downloading",
            JobStatus::Transcribing => "transcribing",
            JobStatus::ExtractingTopics => "extracting_topics",
            JobStatus::Embedding => "embedding",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
            JobStatus::Paused => "paused",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-video pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoState {
    #[default]
    Queued,
    Fetching,
    Filtering,
    Downloading,
    Transcribing,
    ExtractingV1,
    ExtractingV2,
    Indexing,
    Complete,
    Failed,
    SkippedExisting,
    SkippedNoSpeech,
}

impl VideoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoState::Queued => "queued",
            VideoState::Fetching => "fetching",
            VideoState::Filtering => "filtering",
            VideoState::Downloading => "downloading",
            VideoState::Transcribing => "transcribing",
            VideoState::ExtractingV1 => "extracting_v1",
            VideoState::ExtractingV2 => "extracting_v2",
            VideoState::Indexing => "indexing",
            VideoState::Complete => "complete",
            VideoState::Failed => "failed",
            VideoState::SkippedExisting => "skipped_existing",
            VideoState::SkippedNoSpeech => "skipped_no_speech",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoState::Complete
                | VideoState::Failed
                | VideoState::SkippedExisting
                | VideoState::SkippedNoSpeech
        )
    }

    /// Nominal completion percentage for progress reporting.
    pub fn progress_pct(&self) -> u8 {
        match self {
            VideoState::Queued => 0,
            VideoState::Fetching => 5,
            VideoState::Filtering => 10,
            VideoState::Downloading => 25,
            VideoState::Transcribing => 50,
            VideoState::ExtractingV1 => 70,
            VideoState::ExtractingV2 => 80,
            VideoState::Indexing => 90,
            VideoState::Complete
            | VideoState::Failed
            | VideoState::SkippedExisting
            | VideoState::SkippedNoSpeech => 100,
        }
    }
}

impl fmt::Display for VideoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of one video within a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoProgress {
    pub video_id: VideoId,
    pub title: String,
    pub status: VideoState,
    /// Human-readable description of the current step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// 0..=100
    pub progress_pct: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl VideoProgress {
    pub fn new(video_id: VideoId, title: impl Into<String>) -> Self {
        Self {
            video_id,
            title: title.into(),
            status: VideoState::Queued,
            step: None,
            progress_pct: 0,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Progress of one creator within a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountProgress {
    pub creator: CreatorHandle,
    pub status: JobStatus,
    pub total_found: usize,
    pub filtered_count: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_video: Option<VideoId>,
    #[serde(default)]
    pub videos: Vec<VideoProgress>,
}

impl AccountProgress {
    pub fn new(creator: CreatorHandle) -> Self {
        Self {
            creator,
            status: JobStatus::Queued,
            total_found: 0,
            filtered_count: 0,
            processed: 0,
            skipped: 0,
            failed: 0,
            current_video: None,
            videos: Vec::new(),
        }
    }
}

/// A control-plane unit of work spanning one or more creators.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub job_id: Uuid,
    pub creators: Vec<CreatorHandle>,
    pub filters: IngestFilters,
    pub settings: IngestSettings,
    pub status: JobStatus,
    pub accounts: Vec<AccountProgress>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a queued job for the given creators.
    pub fn new(creators: Vec<CreatorHandle>, filters: IngestFilters, settings: IngestSettings) -> Self {
        let accounts = creators
            .iter()
            .cloned()
            .map(AccountProgress::new)
            .collect();
        Self {
            job_id: Uuid::new_v4(),
            creators,
            filters,
            settings,
            status: JobStatus::Queued,
            accounts,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Mark the job started.
    pub fn start(&mut self) {
        self.status = JobStatus::FetchingMetadata;
        self.started_at = Some(Utc::now());
    }

    /// Mark the job complete.
    pub fn complete(&mut self) {
        self.status = JobStatus::Complete;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the job failed with a reason.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Mark the job cancelled.
    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Aggregate completion: processed over filtered, 0 when nothing filtered.
    pub fn overall_progress(&self) -> f64 {
        let filtered: usize = self.accounts.iter().map(|a| a.filtered_count).sum();
        if filtered == 0 {
            return 0.0;
        }
        let processed: usize = self.accounts.iter().map(|a| a.processed).sum();
        processed as f64 / filtered as f64 * 100.0
    }

    /// Mutable access to one account's progress.
    pub fn account_mut(&mut self, creator: &CreatorHandle) -> Option<&mut AccountProgress> {
        self.accounts.iter_mut().find(|a| &a.creator == creator)
    }
}
