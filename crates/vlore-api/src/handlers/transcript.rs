//! Transcript view with semantic or timestamp highlights.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use vlore_models::{parse_mmss, CreatorHandle, TranscriptHighlights};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
    /// Free-text query for semantic highlighting
    pub query: Option<String>,
    /// Comma-separated `MM:SS` stamps to mark directly
    pub highlights: Option<String>,
}

pub async fn get_transcript(
    State(state): State<AppState>,
    Path((creator, video_id)): Path<(String, String)>,
    Query(params): Query<TranscriptQuery>,
) -> ApiResult<Json<TranscriptHighlights>> {
    let creator =
        CreatorHandle::new(&creator).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let video_id = video_id.into();

    let highlights = match (&params.query, &params.highlights) {
        (Some(query), _) if !query.trim().is_empty() => {
            state
                .search
                .highlight_transcript(&creator, &video_id, query)
                .await?
        }
        (_, Some(stamps)) if !stamps.trim().is_empty() => {
            let parsed: Result<Vec<f64>, _> = stamps
                .split(',')
                .map(|s| parse_mmss(s.trim()))
                .collect();
            let stamps =
                parsed.map_err(|e| ApiError::bad_request(format!("bad highlight stamp: {e}")))?;
            state
                .search
                .highlight_timestamps(&creator, &video_id, &stamps)
                .await?
        }
        _ => state.search.plain_transcript(&creator, &video_id).await?,
    };
    Ok(Json(highlights))
}
