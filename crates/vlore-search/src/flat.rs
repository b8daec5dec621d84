//! Flat inner-product index: the shipped implementation of the ANN
//! port. Exact search; fine at the scale of one machine's transcripts.

use vlore_ports::{AnnIndex, PortError, PortResult};

pub struct FlatIndex {
    dimension: usize,
    rows: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Fresh flat index ranked by inner product.
    pub fn new_flat_inner_product(dimension: usize) -> Self {
        Self {
            dimension,
            rows: Vec::new(),
        }
    }

    /// Row-major view of the stored vectors.
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }
}

impl AnnIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> PortResult<()> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(PortError::engine(format!(
                    "vector dimension {} does not match index dimension {}",
                    vector.len(),
                    self.dimension
                )));
            }
        }
        self.rows.extend(vectors.iter().cloned());
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> PortResult<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(PortError::engine(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }
        let mut scored: Vec<(usize, f32)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(id, row)| {
                let score: f32 = row.iter().zip(query).map(|(a, b)| a * b).sum();
                (id, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}
