//! Approximate-nearest-neighbour index port.

use crate::error::PortResult;

/// Dense vector index ranked by inner product.
///
/// Vectors are L2-normalised at production, so inner product equals
/// cosine similarity. Row ids are positional: the i-th added vector has
/// id i.
pub trait AnnIndex: Send + Sync {
    /// Vector dimension the index was built with.
    fn dimension(&self) -> usize;

    /// Number of vectors currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append rows. Every row must match `dimension()`.
    fn add(&mut self, vectors: &[Vec<f32>]) -> PortResult<()>;

    /// Return up to `k` `(row_id, score)` pairs, best first.
    fn search(&self, query: &[f32], k: usize) -> PortResult<Vec<(usize, f32)>>;
}
