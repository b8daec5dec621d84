//! Job lifecycle: creation, scheduling, pause/resume/cancel and
//! progress aggregation.
//!
//! One background executor task per job. Creators run sequentially
//! within a job; videos within a creator run on a bounded pool. HTTP
//! pollers read a snapshot copy of the job under its own mutex, so
//! polling never blocks the worker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use vlore_models::{
    CreatorHandle, ErrorKind, IngestFilters, IngestRequest, IngestSettings, Job, JobStatus,
    VideoId, VideoProgress, VideoState,
};
use vlore_ports::PortError;

use crate::control::{ControlFlags, JobControl, JobInterrupted};
use crate::error::{IngestError, IngestResult};
use crate::pipeline::{
    finalize_account, process_video, PipelineContext, StageReporter, VideoOutcome,
};
use crate::retry::{retry_if, RetryConfig};

pub use crate::pipeline::IngestConfig;

/// One job's shared state: the progress snapshot and the control flags.
pub struct JobHandle {
    job: Mutex<Job>,
    flags: Arc<ControlFlags>,
    /// Status to restore on resume
    prev_status: Mutex<Option<JobStatus>>,
}

impl JobHandle {
    fn new(job: Job) -> Self {
        Self {
            job: Mutex::new(job),
            flags: Arc::new(ControlFlags::default()),
            prev_status: Mutex::new(None),
        }
    }

    /// Apply a mutation to the snapshot unless the job was cancelled;
    /// nothing may overwrite a terminal cancel.
    fn publish<F: FnOnce(&mut Job)>(&self, mutate: F) {
        if self.flags.is_cancelled() {
            return;
        }
        let mut job = self.job.lock().expect("job mutex poisoned");
        mutate(&mut job);
    }

    fn snapshot(&self) -> Job {
        self.job.lock().expect("job mutex poisoned").clone()
    }
}

/// Owns every job and its executor.
pub struct JobManager {
    ctx: Arc<PipelineContext>,
    jobs: Mutex<HashMap<Uuid, Arc<JobHandle>>>,
}

impl JobManager {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// Validate, enqueue and spawn a job. Returns immediately with the
    /// job id.
    pub fn start_job(&self, request: IngestRequest) -> IngestResult<Uuid> {
        let creators = validate_request(&request)?;
        let job = Job::new(creators, request.filters, request.settings);
        let job_id = job.job_id;
        let handle = Arc::new(JobHandle::new(job));

        self.jobs
            .lock()
            .expect("job map mutex poisoned")
            .insert(job_id, Arc::clone(&handle));

        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            run_job(ctx, handle).await;
        });

        metrics::counter!("vlore_jobs_started_total").increment(1);
        info!(%job_id, "job started");
        Ok(job_id)
    }

    /// Full snapshot for pollers.
    pub fn get_status(&self, job_id: Uuid) -> IngestResult<Job> {
        Ok(self.handle(job_id)?.snapshot())
    }

    /// Snapshots of every job, newest first.
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .expect("job map mutex poisoned")
            .values()
            .map(|h| h.snapshot())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Cooperative pause; observed at the next state transition.
    pub fn pause(&self, job_id: Uuid) -> IngestResult<JobStatus> {
        let handle = self.handle(job_id)?;
        let mut job = handle.job.lock().expect("job mutex poisoned");
        if job.status.is_terminal() || handle.flags.is_cancelled() {
            return Err(IngestError::JobNotPausable(format!(
                "job {job_id} is {}",
                job.status
            )));
        }
        if job.status != JobStatus::Paused {
            *handle.prev_status.lock().expect("status mutex poisoned") = Some(job.status);
            job.status = JobStatus::Paused;
            handle.flags.pause();
        }
        Ok(job.status)
    }

    /// Clear a pause and wake the executor.
    pub fn resume(&self, job_id: Uuid) -> IngestResult<JobStatus> {
        let handle = self.handle(job_id)?;
        let mut job = handle.job.lock().expect("job mutex poisoned");
        if job.status.is_terminal() || handle.flags.is_cancelled() {
            return Err(IngestError::JobNotResumable(format!(
                "job {job_id} is {}",
                job.status
            )));
        }
        if job.status != JobStatus::Paused {
            return Err(IngestError::JobNotResumable(format!(
                "job {job_id} is not paused"
            )));
        }
        let restored = handle
            .prev_status
            .lock()
            .expect("status mutex poisoned")
            .take()
            .unwrap_or(JobStatus::FetchingMetadata);
        job.status = restored;
        handle.flags.resume();
        Ok(job.status)
    }

    /// Terminal cancel. The status flips immediately; in-flight work
    /// stops at its next suspension point without committing further.
    pub fn cancel(&self, job_id: Uuid) -> IngestResult<JobStatus> {
        let handle = self.handle(job_id)?;
        let mut job = handle.job.lock().expect("job mutex poisoned");
        if job.status.is_terminal() {
            return Err(IngestError::JobAlreadyTerminal(job_id));
        }
        job.cancel();
        handle.flags.cancel();
        metrics::counter!("vlore_jobs_cancelled_total").increment(1);
        Ok(job.status)
    }

    fn handle(&self, job_id: Uuid) -> IngestResult<Arc<JobHandle>> {
        self.jobs
            .lock()
            .expect("job map mutex poisoned")
            .get(&job_id)
            .cloned()
            .ok_or(IngestError::JobNotFound(job_id))
    }
}

fn validate_request(request: &IngestRequest) -> IngestResult<Vec<CreatorHandle>> {
    if request.usernames.is_empty() {
        return Err(IngestError::validation("usernames cannot be empty"));
    }
    let mut creators = Vec::with_capacity(request.usernames.len());
    for username in &request.usernames {
        let handle = CreatorHandle::new(username)
            .map_err(|e| IngestError::validation(format!("'{username}': {e}")))?;
        if !creators.contains(&handle) {
            creators.push(handle);
        }
    }

    let filters = &request.filters;
    for (name, value) in [
        ("history_start", filters.history_start),
        ("history_end", filters.history_end),
    ] {
        if let Some(v) = value {
            if !(0.0..=1.0).contains(&v) {
                return Err(IngestError::validation(format!(
                    "{name} must be within [0, 1], got {v}"
                )));
            }
        }
    }
    if let (Some(start), Some(end)) = (filters.history_start, filters.history_end) {
        if start > end {
            return Err(IngestError::validation(
                "history_start must not exceed history_end",
            ));
        }
    }
    if request.settings.concurrency == 0 {
        return Err(IngestError::validation("concurrency must be at least 1"));
    }
    Ok(creators)
}

async fn run_job(ctx: Arc<PipelineContext>, handle: Arc<JobHandle>) {
    let control = JobControl::new(Arc::clone(&handle.flags));
    handle.publish(|job| job.start());

    let (creators, filters, settings) = {
        let job = handle.snapshot();
        (job.creators, job.filters, job.settings)
    };

    for creator in &creators {
        if control.checkpoint().await.is_err() {
            return;
        }
        if let Err(JobInterrupted) =
            process_creator(&ctx, &handle, &control, creator, &filters, &settings).await
        {
            return;
        }
    }

    handle.publish(|job| {
        let any_complete = job
            .accounts
            .iter()
            .any(|a| a.status == JobStatus::Complete);
        let any_failed = job.accounts.iter().any(|a| a.status == JobStatus::Failed);
        if any_failed && !any_complete {
            job.fail("no accounts completed");
            metrics::counter!("vlore_jobs_failed_total").increment(1);
        } else {
            job.complete();
            metrics::counter!("vlore_jobs_completed_total").increment(1);
        }
    });
    info!(job_id = %handle.snapshot().job_id, "job finished");
}

async fn process_creator(
    ctx: &Arc<PipelineContext>,
    handle: &Arc<JobHandle>,
    control: &JobControl,
    creator: &CreatorHandle,
    filters: &IngestFilters,
    settings: &IngestSettings,
) -> Result<(), JobInterrupted> {
    // A known non-matching category skips the creator entirely; an
    // unknown category skips the filter.
    if let Some(required) = &filters.required_category {
        if let Ok(assignment) = ctx.topics_store.read_category(creator).await {
            if &assignment.category != required {
                info!(creator = %creator, category = %assignment.category,
                      "creator outside required category, skipping");
                handle.publish(|job| {
                    if let Some(account) = job.account_mut(creator) {
                        account.status = JobStatus::Complete;
                    }
                });
                return Ok(());
            }
        }
    }

    set_phase(handle, creator, JobStatus::FetchingMetadata);
    let retry = RetryConfig::new(format!("list videos of {creator}"));
    let listing = match retry_if(
        &retry,
        || ctx.source.list_videos(creator),
        |e: &PortError| e.error_kind().is_transient(),
    )
    .await
    {
        Ok(listing) => listing,
        Err(e) => {
            error!(creator = %creator, error = %e, "metadata listing failed");
            handle.publish(|job| {
                if let Some(account) = job.account_mut(creator) {
                    account.status = JobStatus::Failed;
                }
            });
            return Ok(());
        }
    };

    set_phase(handle, creator, JobStatus::Filtering);
    let total_found = listing.len();
    let filtered = crate::filters::apply_filters(listing, filters, settings);
    let videos = filtered.videos;
    handle.publish(|job| {
        if let Some(account) = job.account_mut(creator) {
            account.total_found = total_found;
            account.filtered_count = videos.len();
            account.skipped += filtered.duration_skipped;
            account.videos = videos
                .iter()
                .map(|v| VideoProgress::new(v.id.clone(), &v.title))
                .collect();
        }
    });

    let creator_failed = Arc::new(AtomicBool::new(false));
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let commit_lock = Arc::new(tokio::sync::Mutex::new(()));
    let mut tasks = tokio::task::JoinSet::new();

    for video in videos {
        let ctx = Arc::clone(ctx);
        let handle = Arc::clone(handle);
        let control = control.clone();
        let creator = creator.clone();
        let filters = filters.clone();
        let settings = settings.clone();
        let semaphore = Arc::clone(&semaphore);
        let commit_lock = Arc::clone(&commit_lock);
        let creator_failed = Arc::clone(&creator_failed);

        tasks.spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            if creator_failed.load(Ordering::SeqCst) || control.is_cancelled() {
                return;
            }

            let reporter = VideoReporter {
                handle: Arc::clone(&handle),
                creator: creator.clone(),
                video_id: video.id.clone(),
            };
            reporter.mark_started();

            let outcome = process_video(
                &ctx,
                &creator,
                &video,
                &filters,
                &settings,
                &control,
                &reporter,
                &commit_lock,
            )
            .await;
            reporter.mark_finished(&outcome);

            if let VideoOutcome::Failed { kind, .. } = &outcome {
                if *kind == ErrorKind::IndexWrite {
                    creator_failed.store(true, Ordering::SeqCst);
                }
            }
        });
    }
    while tasks.join_next().await.is_some() {}

    if control.is_cancelled() {
        return Err(JobInterrupted);
    }

    if creator_failed.load(Ordering::SeqCst) {
        warn!(creator = %creator, "creator failed on account index write");
        handle.publish(|job| {
            if let Some(account) = job.account_mut(creator) {
                account.status = JobStatus::Failed;
                account.current_video = None;
            }
        });
        return Ok(());
    }

    // Run stats and the deterministic post-account step only when the
    // creator actually had anything to do
    if total_found > 0 {
        let skipped = {
            let snap = handle.snapshot();
            snap.accounts
                .iter()
                .find(|a| &a.creator == creator)
                .map(|a| a.skipped)
                .unwrap_or(0)
        };
        if let Err(e) = ctx
            .account_index
            .update_run_stats(creator, total_found, skipped)
            .await
        {
            warn!(creator = %creator, error = %e, "failed to update run stats");
        }

        set_phase(handle, creator, JobStatus::ExtractingTopics);
        if let Err(e) = finalize_account(ctx, creator).await {
            warn!(creator = %creator, error = %e, "account finalisation failed");
        }
    }

    handle.publish(|job| {
        if let Some(account) = job.account_mut(creator) {
            account.status = JobStatus::Complete;
            account.current_video = None;
        }
    });
    Ok(())
}

fn set_phase(handle: &JobHandle, creator: &CreatorHandle, status: JobStatus) {
    let paused = handle.flags.is_paused();
    handle.publish(|job| {
        if !paused {
            job.status = status;
        }
        if let Some(account) = job.account_mut(creator) {
            account.status = status;
        }
    });
}

/// Maps per-video stages into the job snapshot.
struct VideoReporter {
    handle: Arc<JobHandle>,
    creator: CreatorHandle,
    video_id: VideoId,
}

impl VideoReporter {
    fn mark_started(&self) {
        let video_id = self.video_id.clone();
        let creator = self.creator.clone();
        self.handle.publish(|job| {
            if let Some(account) = job.account_mut(&creator) {
                account.current_video = Some(video_id.clone());
                if let Some(video) = account.videos.iter_mut().find(|v| v.video_id == video_id) {
                    video.started_at = Some(chrono::Utc::now());
                }
            }
        });
    }

    fn mark_finished(&self, outcome: &VideoOutcome) {
        let video_id = self.video_id.clone();
        let creator = self.creator.clone();
        let state = outcome.final_state();
        let error = match outcome {
            VideoOutcome::Failed { message, .. } => Some(message.clone()),
            _ => None,
        };
        let counters = match outcome {
            VideoOutcome::Completed { .. } | VideoOutcome::SkippedUntagged => (1, 0, 0),
            VideoOutcome::SkippedExisting | VideoOutcome::SkippedNoSpeech => (0, 1, 0),
            VideoOutcome::Failed { .. } => (0, 0, 1),
            VideoOutcome::Interrupted => (0, 0, 0),
        };

        self.handle.publish(|job| {
            if let Some(account) = job.account_mut(&creator) {
                account.processed += counters.0;
                account.skipped += counters.1;
                account.failed += counters.2;
                if let Some(video) = account.videos.iter_mut().find(|v| v.video_id == video_id) {
                    if !matches!(outcome, VideoOutcome::Interrupted) {
                        video.status = state;
                        video.progress_pct = state.progress_pct();
                        video.completed_at = Some(chrono::Utc::now());
                        video.error = error.clone();
                        video.step = None;
                    }
                }
            }
        });

        match outcome {
            VideoOutcome::Completed { .. } => {
                metrics::counter!("vlore_videos_processed_total").increment(1)
            }
            VideoOutcome::Failed { .. } => {
                metrics::counter!("vlore_videos_failed_total").increment(1)
            }
            _ => {}
        }
    }
}

impl StageReporter for VideoReporter {
    fn stage(&self, state: VideoState, step: &str) {
        let video_id = self.video_id.clone();
        let creator = self.creator.clone();
        let step = step.to_string();
        // In-flight work finishing its checkpoint must not mask a pause
        let paused = self.handle.flags.is_paused();
        self.handle.publish(|job| {
            if !paused {
                job.status = job_phase(state);
            }
            if let Some(account) = job.account_mut(&creator) {
                if !paused {
                    account.status = job_phase(state);
                }
                account.current_video = Some(video_id.clone());
                if let Some(video) = account.videos.iter_mut().find(|v| v.video_id == video_id) {
                    video.status = state;
                    video.progress_pct = video.progress_pct.max(state.progress_pct());
                    video.step = Some(step.clone());
                }
            }
        });
    }
}

fn job_phase(state: VideoState) -> JobStatus {
    match state {
        VideoState::Queued | VideoState::Fetching => JobStatus::FetchingMetadata,
        VideoState::Filtering => JobStatus::Filtering,
        VideoState::Downloading => JobStatus::Downloading,
        VideoState::Transcribing => JobStatus::Transcribing,
        VideoState::ExtractingV1 | VideoState::ExtractingV2 => JobStatus::ExtractingTopics,
        VideoState::Indexing => JobStatus::Embedding,
        _ => JobStatus::Embedding,
    }
}

/// Build a pipeline context from already-constructed engines.
pub fn build_context(
    source: Arc<dyn vlore_ports::VideoSource>,
    transcriber: Arc<dyn vlore_ports::Transcriber>,
    embedder: Arc<dyn vlore_ports::Embedder>,
    layout: vlore_store::Layout,
    extractor: Arc<vlore_topics::TopicExtractor>,
    classifier: Arc<vlore_topics::CategoryClassifier>,
    umbrella: Arc<vlore_topics::UmbrellaBuilder>,
    search: Arc<vlore_search::SearchEngine>,
    config: IngestConfig,
) -> PipelineContext {
    PipelineContext {
        source,
        transcriber,
        embedder,
        account_index: vlore_store::AccountIndex::new(layout.clone()),
        transcripts: vlore_store::TranscriptStore::new(layout.clone()),
        topics_store: vlore_store::TopicsStore::new(layout),
        extractor,
        classifier,
        umbrella,
        search,
        config,
    }
}
