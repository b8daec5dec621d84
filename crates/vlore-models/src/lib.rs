//! Shared data models for the VidLore backend.
//!
//! This crate provides Serde-serializable types for:
//! - Creator handles and video identifiers
//! - Account indexes and processed-video records
//! - Transcript artifacts with sentence timings
//! - Topic records, account aggregates, categories and umbrella clusters
//! - Vector-index segments and search requests/results
//! - Ingestion jobs, filters, settings and progress snapshots
//! - The per-video failure taxonomy

pub mod account;
pub mod error_kind;
pub mod ids;
pub mod job;
pub mod search;
pub mod timestamp;
pub mod topic;
pub mod transcript;
pub mod video;

// Re-export common types
pub use account::{AccountIndexFile, AccountStats, ProcessedVideoRecord};
pub use error_kind::ErrorKind;
pub use ids::{CreatorHandle, HandleError, VideoId};
pub use job::{
    AccountProgress, IngestFilters, IngestRequest, IngestSettings, Job, JobStatus, VideoProgress,
    VideoState, WhisperMode,
};
pub use search::{
    IndexSegment, SearchFilters, SearchRequest, SearchResult, SearchSort, SegmentMeta,
    TranscriptHighlights, TranscriptSegment,
};
pub use timestamp::{format_mmss, parse_mmss, TimestampError};
pub use topic::{
    AccountTagAggregate, CategoryAssignment, Evidence, TopicRecord, TopicSource, TopicStats,
    UmbrellaCluster, UmbrellaFile,
};
pub use transcript::{Sentence, TranscriptArtifact, TranscriptMeta};
pub use video::VideoMeta;
