//! System verification endpoint.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SystemReport {
    pub total_creators: usize,
    pub total_transcripts: usize,
    pub total_vectors: usize,
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Healthy iff there is at least one creator and at least one vector;
/// a computation failure reports `error` rather than failing the call.
pub async fn verify_system(State(state): State<AppState>) -> Json<SystemReport> {
    match compute_report(&state).await {
        Ok(report) => Json(report),
        Err(e) => {
            error!(error = %e, "system verification failed");
            Json(SystemReport {
                total_creators: 0,
                total_transcripts: 0,
                total_vectors: 0,
                status: "error",
                timestamp: Utc::now(),
            })
        }
    }
}

async fn compute_report(state: &AppState) -> Result<SystemReport, vlore_store::StoreError> {
    let creators = state.layout.list_creators().await?;
    let mut total_transcripts = 0usize;
    for creator in &creators {
        total_transcripts += state.transcripts.list_video_ids(creator).await?.len();
    }
    let total_vectors = state.vector_index.size().await;

    let status = if !creators.is_empty() && total_vectors > 0 {
        "healthy"
    } else {
        "warning"
    };
    Ok(SystemReport {
        total_creators: creators.len(),
        total_transcripts,
        total_vectors,
        status,
        timestamp: Utc::now(),
    })
}
