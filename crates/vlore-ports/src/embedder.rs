//! Sentence-embedding port.

use async_trait::async_trait;

use crate::error::PortResult;

/// Text-to-vector model with a dimension fixed for the lifetime of the
/// vector index. Outputs are L2-normalised, so inner product equals
/// cosine similarity.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn encode(&self, text: &str) -> PortResult<Vec<f32>>;

    /// Embed a batch, preserving order. Default delegates to `encode`.
    async fn encode_batch(&self, texts: &[String]) -> PortResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.encode(text).await?);
        }
        Ok(out)
    }

    /// Output dimension D.
    fn dimension(&self) -> usize;
}
