//! Per-creator account index: the idempotency source of truth.

use chrono::Utc;
use tracing::{debug, warn};

use vlore_models::{AccountIndexFile, CreatorHandle, ProcessedVideoRecord, VideoId, VideoMeta};

use crate::error::{StoreError, StoreResult};
use crate::layout::{write_json_atomic, Layout};

/// Reader/writer for `index.json` files.
///
/// Writers must be serialised per creator by the caller; the job
/// scheduler never runs two workers mutating the same creator's index.
#[derive(Debug, Clone)]
pub struct AccountIndex {
    layout: Layout,
}

impl AccountIndex {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Load a creator's index, or a fresh empty one if none exists yet.
    pub async fn load(&self, creator: &CreatorHandle) -> StoreResult<AccountIndexFile> {
        let path = self.layout.index_path(creator);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(creator = %creator, "no account index yet, starting fresh");
                return Ok(AccountIndexFile::new(creator.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptIndex {
            creator: creator.to_string(),
            reason: e.to_string(),
        })
    }

    /// Whether an index file exists on disk for this creator.
    pub async fn exists(&self, creator: &CreatorHandle) -> bool {
        tokio::fs::try_exists(self.layout.index_path(creator))
            .await
            .unwrap_or(false)
    }

    /// Video ids already processed. Failed records are excluded unless
    /// requested.
    pub async fn processed_ids(
        &self,
        creator: &CreatorHandle,
        include_failed: bool,
    ) -> StoreResult<Vec<VideoId>> {
        Ok(self.load(creator).await?.processed_ids(include_failed))
    }

    /// Drop candidates already present in the index, preserving input
    /// order.
    pub async fn filter_new(
        &self,
        creator: &CreatorHandle,
        candidates: Vec<VideoMeta>,
        include_failed: bool,
    ) -> StoreResult<Vec<VideoMeta>> {
        let done: std::collections::HashSet<VideoId> = self
            .processed_ids(creator, include_failed)
            .await?
            .into_iter()
            .collect();
        Ok(candidates
            .into_iter()
            .filter(|v| !done.contains(&v.id))
            .collect())
    }

    /// Commit one record: load, upsert, atomically replace the file.
    ///
    /// The temp-and-rename protocol means a failed commit leaves the
    /// previous index intact.
    pub async fn commit(
        &self,
        creator: &CreatorHandle,
        record: ProcessedVideoRecord,
    ) -> StoreResult<AccountIndexFile> {
        let mut index = self.load(creator).await?;
        index.upsert(record);
        index.stats.last_run_at = Some(Utc::now());
        self.replace(creator, &index).await?;
        Ok(index)
    }

    /// Update the run-level counters without touching any record.
    pub async fn update_run_stats(
        &self,
        creator: &CreatorHandle,
        total_found: usize,
        skipped: usize,
    ) -> StoreResult<()> {
        let mut index = self.load(creator).await?;
        index.stats.total_found = total_found;
        index.stats.skipped = skipped;
        index.stats.last_run_at = Some(Utc::now());
        index.last_updated = Utc::now();
        self.replace(creator, &index).await
    }

    async fn replace(&self, creator: &CreatorHandle, index: &AccountIndexFile) -> StoreResult<()> {
        let path = self.layout.index_path(creator);
        write_json_atomic(&path, index).await.map_err(|e| {
            warn!(creator = %creator, error = %e, "account index commit failed");
            StoreError::index_write(format!("{creator}: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vlore_models::ErrorKind;

    fn setup() -> (TempDir, AccountIndex, CreatorHandle) {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("accounts"), tmp.path().join("data"));
        let creator = CreatorHandle::new("tester").unwrap();
        (tmp, AccountIndex::new(layout), creator)
    }

    fn success_record(id: &str) -> ProcessedVideoRecord {
        ProcessedVideoRecord::success(
            id.into(),
            format!("title {id}"),
            format!("https://v/{id}"),
            format!("tester/transcriptions/{id}_transcript.json"),
            100,
        )
    }

    #[tokio::test]
    async fn test_load_missing_creates_empty() {
        let (_tmp, index, creator) = setup();
        let file = index.load(&creator).await.unwrap();
        assert!(file.processed_videos.is_empty());
        assert!(!index.exists(&creator).await);
    }

    #[tokio::test]
    async fn test_commit_roundtrip_and_stats() {
        let (_tmp, index, creator) = setup();
        index.commit(&creator, success_record("a")).await.unwrap();
        index
            .commit(
                &creator,
                ProcessedVideoRecord::failure("b".into(), "t", "u", ErrorKind::NotFound),
            )
            .await
            .unwrap();

        let file = index.load(&creator).await.unwrap();
        assert_eq!(file.processed_videos.len(), 2);
        assert_eq!(file.stats.processed, 1);
        assert_eq!(file.stats.failed, 1);
        assert!(index.exists(&creator).await);
    }

    #[tokio::test]
    async fn test_commit_is_idempotent_per_video() {
        let (_tmp, index, creator) = setup();
        index.commit(&creator, success_record("a")).await.unwrap();
        index.commit(&creator, success_record("a")).await.unwrap();

        let file = index.load(&creator).await.unwrap();
        assert_eq!(file.processed_videos.len(), 1);
        assert_eq!(file.stats.processed, 1);
    }

    #[tokio::test]
    async fn test_filter_new_preserves_order() {
        let (_tmp, index, creator) = setup();
        index.commit(&creator, success_record("b")).await.unwrap();

        let candidates = vec![
            VideoMeta::new("a", "A", "https://v/a"),
            VideoMeta::new("b", "B", "https://v/b"),
            VideoMeta::new("c", "C", "https://v/c"),
        ];
        let fresh = index.filter_new(&creator, candidates, false).await.unwrap();
        let ids: Vec<&str> = fresh.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_failed_records_retried_unless_included() {
        let (_tmp, index, creator) = setup();
        index
            .commit(
                &creator,
                ProcessedVideoRecord::failure("x".into(), "t", "u", ErrorKind::Network),
            )
            .await
            .unwrap();

        let candidates = vec![VideoMeta::new("x", "X", "https://v/x")];
        let fresh = index
            .filter_new(&creator, candidates.clone(), false)
            .await
            .unwrap();
        assert_eq!(fresh.len(), 1);

        let none = index.filter_new(&creator, candidates, true).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_index_surfaces() {
        let (_tmp, index, creator) = setup();
        let path = index.layout.index_path(&creator);
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        assert!(matches!(
            index.load(&creator).await,
            Err(StoreError::CorruptIndex { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_partial_file_after_commit() {
        let (_tmp, index, creator) = setup();
        index.commit(&creator, success_record("a")).await.unwrap();
        let dir = index.layout.creator_dir(&creator);
        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert!(!entry.file_name().to_string_lossy().ends_with(".tmp"));
        }
    }
}
