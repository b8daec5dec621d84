//! Per-video ingestion state machine.
//!
//! Commit ordering is what makes a crash at any point safe to re-run:
//! transcript artifact, then topic artifacts, then vector-index rows,
//! then the account-index record. A video is only "processed" once the
//! final commit lands; everything before it is safe to overwrite, and
//! the vector index de-duplicates by video on append.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use vlore_models::{
    CreatorHandle, ErrorKind, IngestFilters, IngestSettings, ProcessedVideoRecord, Sentence,
    TranscriptMeta, VideoMeta, VideoState,
};
use vlore_ports::{Embedder, PortError, Transcriber, VideoSource};
use vlore_search::SearchEngine;
use vlore_store::{parse_sentences, AccountIndex, StoreError, TopicsStore, TranscriptStore};
use vlore_topics::{aggregate_account, CategoryClassifier, TopicExtractor, UmbrellaBuilder};

use crate::control::JobControl;
use crate::error::IngestResult;
use crate::retry::{retry_if, RetryConfig};

/// Ingestion tunables.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Scratch space for downloaded audio
    pub work_dir: PathBuf,
    /// Transcripts shorter than this are treated as having no speech
    pub min_speech_chars: usize,
    /// Stored-confidence floor for `retranscribe_low_confidence`
    pub low_confidence_threshold: f32,
    pub retry: RetryConfig,
}

impl IngestConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            min_speech_chars: 50,
            low_confidence_threshold: 0.6,
            retry: RetryConfig::default(),
        }
    }
}

/// Everything a pipeline run needs, built once at startup and shared.
pub struct PipelineContext {
    pub source: Arc<dyn VideoSource>,
    pub transcriber: Arc<dyn Transcriber>,
    pub embedder: Arc<dyn Embedder>,
    pub account_index: AccountIndex,
    pub transcripts: TranscriptStore,
    pub topics_store: TopicsStore,
    pub extractor: Arc<TopicExtractor>,
    pub classifier: Arc<CategoryClassifier>,
    pub umbrella: Arc<UmbrellaBuilder>,
    pub search: Arc<SearchEngine>,
    pub config: IngestConfig,
}

/// Per-video stage sink; the job manager maps stages into the job's
/// progress snapshot.
pub trait StageReporter: Send + Sync {
    fn stage(&self, state: VideoState, step: &str);
}

/// No-op sink for tests and rebuild paths.
pub struct NullReporter;

impl StageReporter for NullReporter {
    fn stage(&self, _state: VideoState, _step: &str) {}
}

/// Terminal result of one video run.
#[derive(Debug)]
pub enum VideoOutcome {
    Completed { indexed_segments: usize },
    SkippedExisting,
    SkippedNoSpeech,
    /// Processed but withheld from the index by the tag post-filter
    SkippedUntagged,
    Failed { kind: ErrorKind, message: String },
    /// Cancel observed mid-video; nothing was committed
    Interrupted,
}

impl VideoOutcome {
    pub fn final_state(&self) -> VideoState {
        match self {
            VideoOutcome::Completed { .. } => VideoState::Complete,
            VideoOutcome::SkippedExisting => VideoState::SkippedExisting,
            VideoOutcome::SkippedNoSpeech => VideoState::SkippedNoSpeech,
            VideoOutcome::SkippedUntagged => VideoState::Complete,
            VideoOutcome::Failed { .. } => VideoState::Failed,
            VideoOutcome::Interrupted => VideoState::Queued,
        }
    }
}

macro_rules! checkpoint {
    ($control:expr) => {
        if $control.checkpoint().await.is_err() {
            return VideoOutcome::Interrupted;
        }
    };
}

/// Drive one video through the state machine.
///
/// `commit_lock` serialises account-index commits within a creator when
/// videos run concurrently.
#[allow(clippy::too_many_arguments)]
pub async fn process_video(
    ctx: &PipelineContext,
    creator: &CreatorHandle,
    video: &VideoMeta,
    filters: &IngestFilters,
    settings: &IngestSettings,
    control: &JobControl,
    reporter: &dyn StageReporter,
    commit_lock: &tokio::sync::Mutex<()>,
) -> VideoOutcome {
    checkpoint!(control);

    // Idempotency gate: only a committed account-index record counts as
    // processed. A transcript orphaned by a crash before the final
    // commit is redone and overwritten.
    let already_processed = ctx
        .account_index
        .load(creator)
        .await
        .map(|index| {
            index
                .processed_videos
                .get(video.id.as_str())
                .map(|r| r.success)
                .unwrap_or(false)
        })
        .unwrap_or(false);
    if settings.skip_existing && already_processed {
        let redrive = settings.retranscribe_low_confidence
            && stored_confidence(ctx, creator, video)
                .await
                .map(|c| c < ctx.config.low_confidence_threshold)
                .unwrap_or(true);
        if !redrive {
            debug!(creator = %creator, video_id = %video.id, "already processed, skipping");
            return VideoOutcome::SkippedExisting;
        }
        info!(creator = %creator, video_id = %video.id, "re-driving low-confidence transcript");
    }

    let work_dir = ctx
        .config
        .work_dir
        .join(creator.as_str())
        .join(video.id.as_str());
    let outcome = run_stages(
        ctx, creator, video, filters, settings, control, reporter, &work_dir, commit_lock,
    )
    .await;
    tokio::fs::remove_dir_all(&work_dir).await.ok();

    // Terminal failures become part of the account record so the rest
    // of the account can proceed; an index-write failure cannot be
    // recorded through the very index that failed.
    if let VideoOutcome::Failed { kind, message } = &outcome {
        if *kind != ErrorKind::IndexWrite {
            let record = ProcessedVideoRecord::failure(
                video.id.clone(),
                &video.title,
                &video.url,
                *kind,
            )
            .with_duration(video.duration_sec);
            let _guard = commit_lock.lock().await;
            if let Err(e) = ctx.account_index.commit(creator, record).await {
                warn!(creator = %creator, video_id = %video.id, error = %e,
                      "failed to record video failure");
            }
        }
        warn!(creator = %creator, video_id = %video.id, kind = %kind, "video failed: {message}");
    }
    outcome
}

#[allow(clippy::too_many_arguments)]
async fn run_stages(
    ctx: &PipelineContext,
    creator: &CreatorHandle,
    video: &VideoMeta,
    filters: &IngestFilters,
    settings: &IngestSettings,
    control: &JobControl,
    reporter: &dyn StageReporter,
    work_dir: &std::path::Path,
    commit_lock: &tokio::sync::Mutex<()>,
) -> VideoOutcome {
    checkpoint!(control);
    reporter.stage(VideoState::Downloading, "Downloading audio");
    let retry = RetryConfig {
        operation_name: format!("download {}", video.id),
        ..ctx.config.retry.clone()
    };
    let audio_path = match retry_if(
        &retry,
        || ctx.source.download_audio(&video.url, work_dir, None),
        |e: &PortError| e.error_kind().is_transient(),
    )
    .await
    {
        Ok(path) => path,
        Err(e) => {
            return VideoOutcome::Failed {
                kind: e.error_kind(),
                message: e.to_string(),
            }
        }
    };

    checkpoint!(control);
    reporter.stage(VideoState::Transcribing, "Transcribing speech");
    let retry = RetryConfig {
        operation_name: format!("transcribe {}", video.id),
        ..ctx.config.retry.clone()
    };
    let transcription = match retry_if(
        &retry,
        || ctx.transcriber.transcribe(&audio_path, settings.whisper_mode),
        |e: &PortError| e.error_kind().is_transient(),
    )
    .await
    {
        Ok(t) => t,
        Err(e) => {
            return VideoOutcome::Failed {
                kind: e.error_kind(),
                message: e.to_string(),
            }
        }
    };

    if transcription.text.chars().count() < ctx.config.min_speech_chars {
        debug!(creator = %creator, video_id = %video.id, "transcript below speech minimum");
        return VideoOutcome::SkippedNoSpeech;
    }

    let sentences = if transcription.sentences.is_empty() {
        parse_sentences(&transcription.text, video.duration_sec)
    } else {
        transcription.sentences
    };

    // Commit step 1: transcript artifact
    checkpoint!(control);
    let meta = TranscriptMeta {
        creator: creator.clone(),
        video_id: video.id.clone(),
        title: video.title.clone(),
        url: video.url.clone(),
        duration_sec: video.duration_sec,
        language: transcription.language.clone(),
        confidence: transcription.confidence,
        processed_at: chrono::Utc::now(),
    };
    let (transcript_path, transcript_chars) = match ctx
        .transcripts
        .write(meta, transcription.text, sentences)
        .await
    {
        Ok(written) => written,
        Err(e) => {
            return VideoOutcome::Failed {
                kind: store_error_kind(&e),
                message: e.to_string(),
            }
        }
    };
    let artifact = match ctx.transcripts.read(creator, &video.id).await {
        Ok(artifact) => artifact,
        Err(e) => {
            return VideoOutcome::Failed {
                kind: store_error_kind(&e),
                message: e.to_string(),
            }
        }
    };

    // Commit step 2: topic artifacts. Extraction failure leaves the
    // artifact missing but the video proceeds.
    checkpoint!(control);
    reporter.stage(VideoState::ExtractingV1, "Extracting topics");
    let records = match ctx.extractor.extract(&artifact, &video.hashtags).await {
        Ok(records) => records,
        Err(e) => {
            warn!(creator = %creator, video_id = %video.id, error = %e,
                  "topic extraction failed, continuing without tags");
            Vec::new()
        }
    };
    if !records.is_empty() {
        reporter.stage(VideoState::ExtractingV2, "Writing topic records");
        if let Err(e) = ctx
            .topics_store
            .write_video_tags(creator, &video.id, &records)
            .await
        {
            warn!(creator = %creator, video_id = %video.id, error = %e,
                  "failed to persist topic records");
        }
    }

    // Tag post-filter: retained artifacts, withheld from the index
    let untagged = !filters.required_tags.is_empty()
        && !records.iter().any(|r| {
            filters
                .required_tags
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&r.canonical))
        });

    // Commit step 3: vector-index rows
    let mut indexed_segments = 0usize;
    if !untagged {
        checkpoint!(control);
        reporter.stage(VideoState::Indexing, "Indexing segments");
        indexed_segments = match ctx.search.index_transcript(&artifact).await {
            Ok(count) => count,
            Err(e) => {
                return VideoOutcome::Failed {
                    kind: search_error_kind(&e),
                    message: e.to_string(),
                }
            }
        };
    }

    // Commit step 4: the account-index record makes it official
    let record = ProcessedVideoRecord::success(
        video.id.clone(),
        &video.title,
        &video.url,
        transcript_path,
        transcript_chars,
    )
    .with_duration(video.duration_sec);
    {
        let _guard = commit_lock.lock().await;
        if let Err(e) = ctx.account_index.commit(creator, record).await {
            return VideoOutcome::Failed {
                kind: ErrorKind::IndexWrite,
                message: e.to_string(),
            };
        }
    }

    info!(creator = %creator, video_id = %video.id, indexed_segments, "video complete");
    if untagged {
        VideoOutcome::SkippedUntagged
    } else {
        VideoOutcome::Completed { indexed_segments }
    }
}

/// Post-account step: aggregate tags, classify the account and build
/// umbrellas. Deterministic, safe to re-run.
pub async fn finalize_account(ctx: &PipelineContext, creator: &CreatorHandle) -> IngestResult<()> {
    let per_video = ctx.topics_store.read_all_video_tags(creator).await?;
    if per_video.is_empty() && ctx.transcripts.list_video_ids(creator).await?.is_empty() {
        debug!(creator = %creator, "nothing to finalise");
        return Ok(());
    }

    let aggregates = aggregate_account(&per_video);
    ctx.topics_store
        .write_account_tags(creator, &aggregates)
        .await?;

    let fallback = if aggregates.is_empty() {
        sample_sentences(ctx, creator).await?
    } else {
        Vec::new()
    };
    match ctx.classifier.classify(&aggregates, &fallback).await {
        Ok(assignment) => {
            ctx.topics_store.write_category(creator, &assignment).await?;
        }
        Err(e) => {
            warn!(creator = %creator, error = %e, "category classification skipped");
        }
    }

    let canonicals: Vec<String> = aggregates.iter().map(|a| a.canonical.clone()).collect();
    let embeddings = ctx.embedder.encode_batch(&canonicals).await?;
    let file = ctx.umbrella.build(&aggregates, &embeddings);
    ctx.topics_store.write_umbrellas(creator, &file).await?;

    info!(
        creator = %creator,
        tags = aggregates.len(),
        umbrellas = file.umbrellas.len(),
        "account finalised"
    );
    Ok(())
}

async fn stored_confidence(
    ctx: &PipelineContext,
    creator: &CreatorHandle,
    video: &VideoMeta,
) -> Option<f32> {
    ctx.transcripts
        .read(creator, &video.id)
        .await
        .ok()
        .and_then(|artifact| artifact.meta.confidence)
}

async fn sample_sentences(
    ctx: &PipelineContext,
    creator: &CreatorHandle,
) -> IngestResult<Vec<String>> {
    let mut sentences: Vec<String> = Vec::new();
    for video_id in ctx.transcripts.list_video_ids(creator).await? {
        if let Ok(artifact) = ctx.transcripts.read(creator, &video_id).await {
            sentences.extend(artifact.sentences.iter().map(|s: &Sentence| s.text.clone()));
        }
        if sentences.len() >= 100 {
            break;
        }
    }
    Ok(sentences)
}

fn store_error_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::CorruptTranscript(_) => ErrorKind::CorruptTranscript,
        StoreError::IndexWrite(_) => ErrorKind::IndexWrite,
        _ => ErrorKind::Internal,
    }
}

fn search_error_kind(e: &vlore_search::SearchError) -> ErrorKind {
    match e {
        vlore_search::SearchError::DimensionMismatch { .. } => ErrorKind::EmbeddingMismatch,
        vlore_search::SearchError::Port(p) => p.error_kind(),
        _ => ErrorKind::Internal,
    }
}
