//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::accounts::{
    account_category, account_tags, account_umbrellas, list_accounts, tags_by_video, video_tags,
};
use crate::handlers::health::health;
use crate::handlers::ingest::{
    cancel_job, job_status, list_jobs, metadata_preview, pause_job, resume_job, start_ingest,
};
use crate::handlers::search::{filter_options, semantic_search};
use crate::handlers::transcript::get_transcript;
use crate::handlers::verify::verify_system;
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let account_routes = Router::new()
        .route("/accounts", get(list_accounts))
        .route("/accounts/:creator/tags", get(account_tags))
        .route("/accounts/:creator/category", get(account_category))
        .route("/accounts/:creator/tags/by-video", get(tags_by_video))
        .route("/accounts/:creator/tags/video/:video_id", get(video_tags))
        .route("/accounts/:creator/umbrellas", get(account_umbrellas));

    let search_routes = Router::new()
        .route("/search/semantic", post(semantic_search))
        .route("/search/filter-options", get(filter_options));

    let transcript_routes = Router::new()
        .route("/transcript/:creator/:video_id", get(get_transcript));

    let ingest_routes = Router::new()
        .route("/ingest/start", post(start_ingest))
        .route("/ingest/metadata/:creator", get(metadata_preview))
        .route("/ingest/jobs", get(list_jobs))
        .route("/ingest/status/:job_id", get(job_status))
        .route("/ingest/pause/:job_id", post(pause_job))
        .route("/ingest/resume/:job_id", post(resume_job))
        .route("/ingest/cancel/:job_id", post(cancel_job));

    let verify_routes = Router::new()
        .route("/verify/system", get(verify_system).post(verify_system));

    let api_routes = Router::new()
        .merge(account_routes)
        .merge(search_routes)
        .merge(transcript_routes)
        .merge(ingest_routes)
        .merge(verify_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
