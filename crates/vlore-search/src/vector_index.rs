//! Append-only dense vector index with a parallel metadata log.
//!
//! Persistent form under `DATA_DIR/search/`: `index.vec` holds a small
//! header plus row-major little-endian f32 vectors, `embeddings.jsonl`
//! one metadata object per line in positional correspondence. Appends
//! stage complete replacement files, fsync, then rename, so a torn pair
//! is never observable; on load the shorter side wins and the index
//! truncates to it.

use std::collections::HashSet;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use vlore_models::{CreatorHandle, SegmentMeta, VideoId};
use vlore_ports::AnnIndex;
use vlore_store::Layout;

use crate::error::{SearchError, SearchOpResult};
use crate::flat::FlatIndex;

const MAGIC: [u8; 4] = *b"VLIX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

struct IndexInner {
    ann: FlatIndex,
    metas: Vec<SegmentMeta>,
    indexed_videos: HashSet<(String, String)>,
}

impl IndexInner {
    fn empty(dimension: usize) -> Self {
        Self {
            ann: FlatIndex::new_flat_inner_product(dimension),
            metas: Vec::new(),
            indexed_videos: HashSet::new(),
        }
    }

    fn register(&mut self, meta: &SegmentMeta) {
        self.indexed_videos.insert((
            meta.creator.as_str().to_string(),
            meta.video_id.as_str().to_string(),
        ));
    }
}

/// Shared vector index: single writer, many readers. Readers take the
/// lock only to compute over an in-memory snapshot; the writer holds it
/// only for the in-memory swap after the staged files are durable.
pub struct VectorIndex {
    layout: Layout,
    dimension: usize,
    inner: RwLock<IndexInner>,
    /// Serialises appends so staging always starts from the tip
    writer: Mutex<()>,
}

impl VectorIndex {
    /// Load the persisted index, or start empty when none exists.
    pub async fn load(layout: Layout, dimension: usize) -> SearchOpResult<Self> {
        let mut inner = IndexInner::empty(dimension);

        let vec_path = layout.vector_index_path();
        let meta_path = layout.metadata_log_path();
        let vectors = match tokio::fs::read(&vec_path).await {
            Ok(bytes) => parse_vector_file(&bytes, dimension)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let metas: Vec<SegmentMeta> = match tokio::fs::read_to_string(&meta_path).await {
            Ok(content) => content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<Result<_, _>>()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let rows = vectors.len().min(metas.len());
        if vectors.len() != metas.len() {
            warn!(
                vectors = vectors.len(),
                metadata = metas.len(),
                kept = rows,
                "vector/metadata length mismatch, truncating to the shorter side"
            );
        }
        let vectors = &vectors[..rows];
        inner
            .ann
            .add(vectors)
            .map_err(|e| SearchError::Corrupt(e.to_string()))?;
        inner.metas = metas.into_iter().take(rows).collect();
        inner.indexed_videos = inner
            .metas
            .iter()
            .map(|m| {
                (
                    m.creator.as_str().to_string(),
                    m.video_id.as_str().to_string(),
                )
            })
            .collect();

        info!(rows, dimension, "vector index loaded");
        Ok(Self {
            layout,
            dimension,
            inner: RwLock::new(inner),
            writer: Mutex::new(()),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn size(&self) -> usize {
        self.inner.read().await.ann.len()
    }

    /// Whether segments for this video are already indexed.
    pub async fn contains(&self, creator: &CreatorHandle, video_id: &VideoId) -> bool {
        self.inner
            .read()
            .await
            .indexed_videos
            .contains(&(creator.as_str().to_string(), video_id.as_str().to_string()))
    }

    /// Append segment rows for one or more videos.
    ///
    /// Rows for videos already present are dropped, which is what makes
    /// a re-run after a crash between index append and account commit
    /// safe. Either every surviving row commits or none do.
    pub async fn append(
        &self,
        segments: Vec<(SegmentMeta, Vec<f32>)>,
    ) -> SearchOpResult<usize> {
        let _writer = self.writer.lock().await;

        let fresh: Vec<(SegmentMeta, Vec<f32>)> = {
            let inner = self.inner.read().await;
            segments
                .into_iter()
                .filter(|(meta, _)| {
                    !inner.indexed_videos.contains(&(
                        meta.creator.as_str().to_string(),
                        meta.video_id.as_str().to_string(),
                    ))
                })
                .collect()
        };
        if fresh.is_empty() {
            return Ok(0);
        }
        for (_, vector) in &fresh {
            if vector.len() != self.dimension {
                return Err(SearchError::DimensionMismatch {
                    expected: self.dimension,
                    got: vector.len(),
                });
            }
        }

        // Stage complete replacement files from the current snapshot plus
        // the fresh rows, make them durable, then swap in memory.
        {
            let inner = self.inner.read().await;
            let mut all_rows: Vec<&[f32]> =
                inner.ann.rows().iter().map(|r| r.as_slice()).collect();
            all_rows.extend(fresh.iter().map(|(_, v)| v.as_slice()));
            let mut all_metas: Vec<&SegmentMeta> = inner.metas.iter().collect();
            all_metas.extend(fresh.iter().map(|(m, _)| m));
            self.persist(&all_rows, &all_metas).await?;
        }

        let appended = fresh.len();
        let mut inner = self.inner.write().await;
        let vectors: Vec<Vec<f32>> = fresh.iter().map(|(_, v)| v.clone()).collect();
        inner
            .ann
            .add(&vectors)
            .map_err(|e| SearchError::Corrupt(e.to_string()))?;
        for (meta, _) in fresh {
            inner.register(&meta);
            inner.metas.push(meta);
        }
        Ok(appended)
    }

    /// Inner-product search over the snapshot.
    pub async fn search(&self, query: &[f32], k: usize) -> SearchOpResult<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        Ok(self.inner.read().await.ann.search(query, k)?)
    }

    /// Metadata row by positional segment id.
    pub async fn meta(&self, segment_id: usize) -> Option<SegmentMeta> {
        self.inner.read().await.metas.get(segment_id).cloned()
    }

    /// Drop everything, in memory and on disk. Rebuild support.
    pub async fn clear(&self) -> SearchOpResult<()> {
        let _writer = self.writer.lock().await;
        self.persist(&[], &[]).await?;
        let mut inner = self.inner.write().await;
        *inner = IndexInner::empty(self.dimension);
        Ok(())
    }

    async fn persist(&self, rows: &[&[f32]], metas: &[&SegmentMeta]) -> SearchOpResult<()> {
        let dir = self.layout.search_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let vec_path = self.layout.vector_index_path();
        let meta_path = self.layout.metadata_log_path();
        let vec_tmp = vec_path.with_extension("vec.tmp");
        let meta_tmp = meta_path.with_extension("jsonl.tmp");

        let mut vec_bytes = Vec::with_capacity(HEADER_LEN + rows.len() * self.dimension * 4);
        vec_bytes.extend_from_slice(&MAGIC);
        vec_bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        vec_bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        vec_bytes.extend_from_slice(&(rows.len() as u32).to_le_bytes());
        for row in rows {
            for value in *row {
                vec_bytes.extend_from_slice(&value.to_le_bytes());
            }
        }

        let mut meta_bytes = Vec::new();
        for meta in metas {
            meta_bytes.extend_from_slice(serde_json::to_string(meta)?.as_bytes());
            meta_bytes.push(b'\n');
        }

        let result: std::io::Result<()> = async {
            let mut f = tokio::fs::File::create(&vec_tmp).await?;
            f.write_all(&vec_bytes).await?;
            f.sync_all().await?;
            let mut f = tokio::fs::File::create(&meta_tmp).await?;
            f.write_all(&meta_bytes).await?;
            f.sync_all().await?;
            // Vectors land first; a crash in between leaves metadata the
            // shorter side, which load() truncates to.
            tokio::fs::rename(&vec_tmp, &vec_path).await?;
            tokio::fs::rename(&meta_tmp, &meta_path).await
        }
        .await;

        if let Err(e) = result {
            tokio::fs::remove_file(&vec_tmp).await.ok();
            tokio::fs::remove_file(&meta_tmp).await.ok();
            return Err(e.into());
        }
        Ok(())
    }
}

fn parse_vector_file(bytes: &[u8], expected_dimension: usize) -> SearchOpResult<Vec<Vec<f32>>> {
    if bytes.len() < HEADER_LEN {
        return Err(SearchError::Corrupt("truncated header".into()));
    }
    if bytes[..4] != MAGIC {
        return Err(SearchError::Corrupt("bad magic".into()));
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().expect("sliced"));
    if version != FORMAT_VERSION {
        return Err(SearchError::Corrupt(format!("unknown version {version}")));
    }
    let dimension = u32::from_le_bytes(bytes[8..12].try_into().expect("sliced")) as usize;
    if dimension != expected_dimension {
        return Err(SearchError::DimensionMismatch {
            expected: expected_dimension,
            got: dimension,
        });
    }
    let count = u32::from_le_bytes(bytes[12..16].try_into().expect("sliced")) as usize;

    let body = &bytes[HEADER_LEN..];
    let row_bytes = dimension * 4;
    // A short body only drops trailing rows
    let complete_rows = (body.len() / row_bytes).min(count);
    let mut rows = Vec::with_capacity(complete_rows);
    for i in 0..complete_rows {
        let row = &body[i * row_bytes..(i + 1) * row_bytes];
        rows.push(
            row.chunks_exact(4)
                .map(|c| f32::from_le_bytes(c.try_into().expect("chunked")))
                .collect(),
        );
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn meta(creator: &str, video: &str, start: f64) -> SegmentMeta {
        SegmentMeta {
            creator: CreatorHandle::new(creator).unwrap(),
            video_id: video.into(),
            start_sec: start,
            end_sec: start + 5.0,
            text: format!("segment of {video} at {start}"),
            indexed_at: Utc::now(),
        }
    }

    fn unit(v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.into_iter().map(|x| x / norm).collect()
    }

    async fn fresh(tmp: &TempDir) -> VectorIndex {
        let layout = Layout::new(tmp.path().join("accounts"), tmp.path().join("data"));
        VectorIndex::load(layout, 4).await.unwrap()
    }

    #[tokio::test]
    async fn test_append_search_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let index = fresh(&tmp).await;

        index
            .append(vec![
                (meta("a", "v1", 0.0), unit(vec![1.0, 0.0, 0.0, 0.0])),
                (meta("a", "v1", 5.0), unit(vec![0.0, 1.0, 0.0, 0.0])),
            ])
            .await
            .unwrap();
        assert_eq!(index.size().await, 2);

        let hits = index.search(&unit(vec![1.0, 0.1, 0.0, 0.0]), 10).await.unwrap();
        assert_eq!(hits[0].0, 0);
        let top = index.meta(hits[0].0).await.unwrap();
        assert_eq!(top.video_id.as_str(), "v1");
        assert_eq!(top.start_sec, 0.0);
    }

    #[tokio::test]
    async fn test_append_deduplicates_by_video() {
        let tmp = TempDir::new().unwrap();
        let index = fresh(&tmp).await;

        let first = index
            .append(vec![(meta("a", "v1", 0.0), unit(vec![1.0, 0.0, 0.0, 0.0]))])
            .await
            .unwrap();
        assert_eq!(first, 1);

        let second = index
            .append(vec![(meta("a", "v1", 0.0), unit(vec![1.0, 0.0, 0.0, 0.0]))])
            .await
            .unwrap();
        assert_eq!(second, 0);
        assert_eq!(index.size().await, 1);
        assert!(index.contains(&CreatorHandle::new("a").unwrap(), &"v1".into()).await);
    }

    #[tokio::test]
    async fn test_persistence_across_loads() {
        let tmp = TempDir::new().unwrap();
        {
            let index = fresh(&tmp).await;
            index
                .append(vec![(meta("a", "v1", 0.0), unit(vec![0.5, 0.5, 0.5, 0.5]))])
                .await
                .unwrap();
        }
        let reloaded = fresh(&tmp).await;
        assert_eq!(reloaded.size().await, 1);
        assert!(
            reloaded
                .contains(&CreatorHandle::new("a").unwrap(), &"v1".into())
                .await
        );
        let hits = reloaded.search(&unit(vec![0.5, 0.5, 0.5, 0.5]), 1).await.unwrap();
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_refused() {
        let tmp = TempDir::new().unwrap();
        let index = fresh(&tmp).await;
        let result = index
            .append(vec![(meta("a", "v1", 0.0), vec![1.0, 0.0])])
            .await;
        assert!(matches!(result, Err(SearchError::DimensionMismatch { .. })));
        assert_eq!(index.size().await, 0);
    }

    #[tokio::test]
    async fn test_torn_metadata_truncates_on_load() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("accounts"), tmp.path().join("data"));
        {
            let index = VectorIndex::load(layout.clone(), 4).await.unwrap();
            index
                .append(vec![
                    (meta("a", "v1", 0.0), unit(vec![1.0, 0.0, 0.0, 0.0])),
                    (meta("a", "v2", 0.0), unit(vec![0.0, 1.0, 0.0, 0.0])),
                ])
                .await
                .unwrap();
        }
        // Drop the last metadata line, simulating a crash between renames
        let content = tokio::fs::read_to_string(layout.metadata_log_path())
            .await
            .unwrap();
        let first_line = content.lines().next().unwrap().to_string() + "\n";
        tokio::fs::write(layout.metadata_log_path(), first_line)
            .await
            .unwrap();

        let reloaded = VectorIndex::load(layout, 4).await.unwrap();
        assert_eq!(reloaded.size().await, 1);
        // The surviving video stays deduplicated, the torn one can re-append
        assert!(
            reloaded
                .contains(&CreatorHandle::new("a").unwrap(), &"v1".into())
                .await
        );
        assert!(
            !reloaded
                .contains(&CreatorHandle::new("a").unwrap(), &"v2".into())
                .await
        );
    }

    #[tokio::test]
    async fn test_clear() {
        let tmp = TempDir::new().unwrap();
        let index = fresh(&tmp).await;
        index
            .append(vec![(meta("a", "v1", 0.0), unit(vec![1.0, 0.0, 0.0, 0.0]))])
            .await
            .unwrap();
        index.clear().await.unwrap();
        assert_eq!(index.size().await, 0);
        assert!(
            !index
                .contains(&CreatorHandle::new("a").unwrap(), &"v1".into())
                .await
        );
    }
}
