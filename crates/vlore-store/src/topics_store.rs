//! Topic artifact persistence: per-video tags, account aggregates,
//! category assignment and umbrella clusters.

use serde::{Deserialize, Serialize};

use vlore_models::{
    AccountTagAggregate, CategoryAssignment, CreatorHandle, TopicRecord, UmbrellaFile, VideoId,
};

use crate::error::{StoreError, StoreResult};
use crate::layout::{write_json_atomic, Layout};

/// First-generation tag shape, kept for readers of older artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyTag {
    pub tag: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct TopicsStore {
    layout: Layout,
}

impl TopicsStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Persist both tag generations for a video: the full records and
    /// the legacy `{tag, score}` projection.
    pub async fn write_video_tags(
        &self,
        creator: &CreatorHandle,
        video_id: &VideoId,
        records: &[TopicRecord],
    ) -> StoreResult<()> {
        let legacy: Vec<LegacyTag> = records
            .iter()
            .map(|r| LegacyTag {
                tag: r.tag.clone(),
                score: r.score_mmr,
            })
            .collect();
        write_json_atomic(&self.layout.video_tags_path(creator, video_id), &legacy).await?;
        write_json_atomic(&self.layout.video_tags_v2_path(creator, video_id), &records).await
    }

    pub async fn read_video_tags(
        &self,
        creator: &CreatorHandle,
        video_id: &VideoId,
    ) -> StoreResult<Vec<TopicRecord>> {
        self.read_json(
            self.layout.video_tags_v2_path(creator, video_id),
            format!("tags for {creator}/{video_id}"),
        )
        .await
    }

    /// All per-video tag records for a creator, keyed by video id.
    pub async fn read_all_video_tags(
        &self,
        creator: &CreatorHandle,
    ) -> StoreResult<Vec<(VideoId, Vec<TopicRecord>)>> {
        let dir = self.layout.topics_dir(creator);
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix("_tags_v2.json") {
                let video_id: VideoId = stem.into();
                let records = self.read_video_tags(creator, &video_id).await?;
                out.push((video_id, records));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    pub async fn write_account_tags(
        &self,
        creator: &CreatorHandle,
        aggregates: &[AccountTagAggregate],
    ) -> StoreResult<()> {
        write_json_atomic(&self.layout.account_tags_path(creator), &aggregates).await
    }

    pub async fn read_account_tags(
        &self,
        creator: &CreatorHandle,
    ) -> StoreResult<Vec<AccountTagAggregate>> {
        self.read_json(
            self.layout.account_tags_path(creator),
            format!("tags not found for {creator}"),
        )
        .await
    }

    pub async fn write_category(
        &self,
        creator: &CreatorHandle,
        assignment: &CategoryAssignment,
    ) -> StoreResult<()> {
        write_json_atomic(&self.layout.account_category_path(creator), assignment).await
    }

    pub async fn read_category(&self, creator: &CreatorHandle) -> StoreResult<CategoryAssignment> {
        self.read_json(
            self.layout.account_category_path(creator),
            format!("category not found for {creator}"),
        )
        .await
    }

    pub async fn write_umbrellas(
        &self,
        creator: &CreatorHandle,
        file: &UmbrellaFile,
    ) -> StoreResult<()> {
        write_json_atomic(&self.layout.umbrellas_path(creator), file).await
    }

    pub async fn read_umbrellas(&self, creator: &CreatorHandle) -> StoreResult<UmbrellaFile> {
        self.read_json(
            self.layout.umbrellas_path(creator),
            format!("umbrellas not found for {creator}"),
        )
        .await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        path: std::path::PathBuf,
        missing: String,
    ) -> StoreResult<T> {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(missing));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}
