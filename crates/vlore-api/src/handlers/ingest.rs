//! Job control endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use vlore_models::{CreatorHandle, IngestRequest, Job, JobStatus, VideoMeta};
use vlore_ports::PortError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn start_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    request.validate()?;
    let job_id = state.manager.start_job(request)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job_id, "status": JobStatus::Queued })),
    ))
}

/// Preview a creator's listing without side effects.
pub async fn metadata_preview(
    State(state): State<AppState>,
    Path(creator): Path<String>,
) -> ApiResult<Json<Vec<VideoMeta>>> {
    let creator =
        CreatorHandle::new(&creator).map_err(|e| ApiError::bad_request(e.to_string()))?;
    match state.source.list_videos(&creator).await {
        Ok(videos) => Ok(Json(videos)),
        Err(PortError::NotFound(msg)) => Err(ApiError::not_found(msg)),
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

/// Condensed row of `GET /api/ingest/jobs`.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub creators: Vec<CreatorHandle>,
    pub overall_progress: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            overall_progress: job.overall_progress(),
            creators: job.creators,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSummary>> {
    Json(
        state
            .manager
            .list_jobs()
            .into_iter()
            .map(JobSummary::from)
            .collect(),
    )
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.manager.get_status(job_id)?))
}

pub async fn pause_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let status = state.manager.pause(job_id)?;
    Ok(Json(json!({ "status": status })))
}

pub async fn resume_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let status = state.manager.resume(job_id)?;
    Ok(Json(json!({ "status": status })))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let status = state.manager.cancel(job_id)?;
    Ok(Json(json!({ "status": status })))
}
