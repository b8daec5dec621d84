//! On-disk layout. All artifact path formation lives here.
//!
//! ```text
//! ACCOUNTS_DIR/
//!   {creator}/index.json
//!   {creator}/transcriptions/{video_id}_transcript.json
//!   {creator}/topics/{video_id}_tags.json
//!   {creator}/topics/{video_id}_tags_v2.json
//!   {creator}/topics/account_tags.json
//!   {creator}/topics/account_category.json
//!   {creator}/topics/topic_umbrellas.json
//! DATA_DIR/
//!   search/index.vec
//!   search/embeddings.jsonl
//! ```

use std::path::{Path, PathBuf};

use vlore_models::{CreatorHandle, VideoId};

use crate::error::StoreResult;

/// Storage roots plus every path builder derived from them.
#[derive(Debug, Clone)]
pub struct Layout {
    accounts_dir: PathBuf,
    data_dir: PathBuf,
}

impl Layout {
    pub fn new(accounts_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            accounts_dir: accounts_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    pub fn accounts_dir(&self) -> &Path {
        &self.accounts_dir
    }

    pub fn creator_dir(&self, creator: &CreatorHandle) -> PathBuf {
        self.accounts_dir.join(creator.as_str())
    }

    pub fn index_path(&self, creator: &CreatorHandle) -> PathBuf {
        self.creator_dir(creator).join("index.json")
    }

    pub fn transcriptions_dir(&self, creator: &CreatorHandle) -> PathBuf {
        self.creator_dir(creator).join("transcriptions")
    }

    pub fn transcript_path(&self, creator: &CreatorHandle, video_id: &VideoId) -> PathBuf {
        self.transcriptions_dir(creator)
            .join(format!("{}_transcript.json", video_id))
    }

    /// Transcript path relative to the accounts root, as recorded in the
    /// account index.
    pub fn transcript_rel_path(&self, creator: &CreatorHandle, video_id: &VideoId) -> String {
        format!("{}/transcriptions/{}_transcript.json", creator, video_id)
    }

    pub fn topics_dir(&self, creator: &CreatorHandle) -> PathBuf {
        self.creator_dir(creator).join("topics")
    }

    pub fn video_tags_path(&self, creator: &CreatorHandle, video_id: &VideoId) -> PathBuf {
        self.topics_dir(creator).join(format!("{}_tags.json", video_id))
    }

    pub fn video_tags_v2_path(&self, creator: &CreatorHandle, video_id: &VideoId) -> PathBuf {
        self.topics_dir(creator)
            .join(format!("{}_tags_v2.json", video_id))
    }

    pub fn account_tags_path(&self, creator: &CreatorHandle) -> PathBuf {
        self.topics_dir(creator).join("account_tags.json")
    }

    pub fn account_category_path(&self, creator: &CreatorHandle) -> PathBuf {
        self.topics_dir(creator).join("account_category.json")
    }

    pub fn umbrellas_path(&self, creator: &CreatorHandle) -> PathBuf {
        self.topics_dir(creator).join("topic_umbrellas.json")
    }

    pub fn search_dir(&self) -> PathBuf {
        self.data_dir.join("search")
    }

    pub fn vector_index_path(&self) -> PathBuf {
        self.search_dir().join("index.vec")
    }

    pub fn metadata_log_path(&self) -> PathBuf {
        self.search_dir().join("embeddings.jsonl")
    }

    /// Creators that have a directory under the accounts root.
    pub async fn list_creators(&self) -> StoreResult<Vec<CreatorHandle>> {
        let mut creators = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.accounts_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(creators),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Ok(handle) = CreatorHandle::new(&entry.file_name().to_string_lossy()) {
                creators.push(handle);
            }
        }
        creators.sort();
        Ok(creators)
    }
}

/// Serialize a value to JSON and atomically replace `path` with it.
///
/// The temp file lives in the target directory so the rename stays on
/// one filesystem. A failed write removes the temp file.
pub(crate) async fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;

    let write_result: std::io::Result<()> = async {
        tokio::fs::write(&tmp, &bytes).await?;
        let file = tokio::fs::File::open(&tmp).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = write_result {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = Layout::new("/accounts", "/data");
        let creator = CreatorHandle::new("maker").unwrap();
        let video: VideoId = "v42".into();

        assert_eq!(
            layout.index_path(&creator),
            PathBuf::from("/accounts/maker/index.json")
        );
        assert_eq!(
            layout.transcript_path(&creator, &video),
            PathBuf::from("/accounts/maker/transcriptions/v42_transcript.json")
        );
        assert_eq!(
            layout.video_tags_v2_path(&creator, &video),
            PathBuf::from("/accounts/maker/topics/v42_tags_v2.json")
        );
        assert_eq!(
            layout.vector_index_path(),
            PathBuf::from("/data/search/index.vec")
        );
        assert_eq!(
            layout.transcript_rel_path(&creator, &video),
            "maker/transcriptions/v42_transcript.json"
        );
    }

    #[tokio::test]
    async fn test_list_creators_missing_root_is_empty() {
        let layout = Layout::new("/nonexistent-vlore-root", "/data");
        assert!(layout.list_creators().await.unwrap().is_empty());
    }
}
