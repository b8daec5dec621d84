//! Account artifact read endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use vlore_models::{AccountTagAggregate, CategoryAssignment, CreatorHandle, TopicRecord, UmbrellaCluster};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn parse_creator(raw: &str) -> ApiResult<CreatorHandle> {
    CreatorHandle::new(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// One row of `GET /api/accounts`.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub creator: CreatorHandle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub video_count: usize,
    pub last_updated: DateTime<Utc>,
    pub top_topics: Vec<String>,
    pub has_transcripts: bool,
    pub has_tags: bool,
    pub has_category: bool,
}

pub async fn list_accounts(State(state): State<AppState>) -> ApiResult<Json<Vec<AccountSummary>>> {
    let mut summaries = Vec::new();
    for creator in state.layout.list_creators().await? {
        let index = state.account_index.load(&creator).await?;
        let transcripts = state.transcripts.list_video_ids(&creator).await?;
        let tags = state.topics.read_account_tags(&creator).await.ok();
        let category = state.topics.read_category(&creator).await.ok();

        let top_topics = tags
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .take(5)
            .map(|t| t.canonical.clone())
            .collect();

        summaries.push(AccountSummary {
            video_count: index.stats.processed,
            last_updated: index.last_updated,
            top_topics,
            has_transcripts: !transcripts.is_empty(),
            has_tags: tags.is_some(),
            has_category: category.is_some(),
            category: category.map(|c| c.category),
            creator,
        });
    }
    Ok(Json(summaries))
}

#[derive(Debug, Deserialize)]
pub struct TagsQuery {
    pub top_n: Option<usize>,
    pub min_frequency: Option<usize>,
}

pub async fn account_tags(
    State(state): State<AppState>,
    Path(creator): Path<String>,
    Query(query): Query<TagsQuery>,
) -> ApiResult<Json<Vec<AccountTagAggregate>>> {
    let creator = parse_creator(&creator)?;
    let mut tags = state.topics.read_account_tags(&creator).await?;
    if let Some(min) = query.min_frequency {
        tags.retain(|t| t.frequency >= min);
    }
    if let Some(n) = query.top_n {
        tags.truncate(n);
    }
    Ok(Json(tags))
}

pub async fn account_category(
    State(state): State<AppState>,
    Path(creator): Path<String>,
) -> ApiResult<Json<CategoryAssignment>> {
    let creator = parse_creator(&creator)?;
    Ok(Json(state.topics.read_category(&creator).await?))
}

pub async fn tags_by_video(
    State(state): State<AppState>,
    Path(creator): Path<String>,
) -> ApiResult<Json<BTreeMap<String, Vec<TopicRecord>>>> {
    let creator = parse_creator(&creator)?;
    let per_video = state.topics.read_all_video_tags(&creator).await?;
    if per_video.is_empty() {
        return Err(ApiError::not_found(format!("tags not found for {creator}")));
    }
    Ok(Json(
        per_video
            .into_iter()
            .map(|(id, records)| (id.as_str().to_string(), records))
            .collect(),
    ))
}

pub async fn video_tags(
    State(state): State<AppState>,
    Path((creator, video_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<TopicRecord>>> {
    let creator = parse_creator(&creator)?;
    Ok(Json(
        state.topics.read_video_tags(&creator, &video_id.into()).await?,
    ))
}

pub async fn account_umbrellas(
    State(state): State<AppState>,
    Path(creator): Path<String>,
) -> ApiResult<Json<Vec<UmbrellaCluster>>> {
    let creator = parse_creator(&creator)?;
    let file = state.topics.read_umbrellas(&creator).await?;
    Ok(Json(file.umbrellas))
}
