//! Semantic search endpoints.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use validator::Validate;

use vlore_models::{CreatorHandle, SearchRequest, SearchResult};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn semantic_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    request.validate()?;
    Ok(Json(state.search.search(&request).await?))
}

/// Values available for the search filter dropdowns.
#[derive(Debug, Serialize)]
pub struct FilterOptions {
    pub creators: Vec<CreatorHandle>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

pub async fn filter_options(State(state): State<AppState>) -> ApiResult<Json<FilterOptions>> {
    let creators = state.layout.list_creators().await?;

    let mut categories = Vec::new();
    let mut ranked_tags: Vec<(String, f32)> = Vec::new();
    for creator in &creators {
        if let Ok(assignment) = state.topics.read_category(creator).await {
            if !categories.contains(&assignment.category) {
                categories.push(assignment.category);
            }
        }
        if let Ok(tags) = state.topics.read_account_tags(creator).await {
            for tag in tags {
                match ranked_tags.iter_mut().find(|(t, _)| *t == tag.canonical) {
                    Some((_, score)) => *score += tag.combined_score,
                    None => ranked_tags.push((tag.canonical, tag.combined_score)),
                }
            }
        }
    }
    categories.sort();
    ranked_tags.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked_tags.truncate(100);

    Ok(Json(FilterOptions {
        creators,
        categories,
        tags: ranked_tags.into_iter().map(|(t, _)| t).collect(),
    }))
}
