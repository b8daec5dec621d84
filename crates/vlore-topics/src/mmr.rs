//! Maximal Marginal Relevance selection.

use crate::similarity::cosine_similarity;

/// Select up to `top_k` candidate indices by iterative MMR:
///
/// `mmr(c) = lambda * cos(c, doc) - (1 - lambda) * max cos(c, selected)`
///
/// Ties break toward higher document relevance, then insertion order.
/// Returns `(candidate_index, mmr_score_at_selection)` pairs in
/// selection order.
pub fn mmr_select(
    candidate_embeddings: &[Vec<f32>],
    doc_embedding: &[f32],
    lambda: f32,
    top_k: usize,
) -> Vec<(usize, f32)> {
    let n = candidate_embeddings.len();
    if n == 0 || top_k == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidate_embeddings
        .iter()
        .map(|c| cosine_similarity(c, doc_embedding))
        .collect();

    let mut selected: Vec<(usize, f32)> = Vec::with_capacity(top_k.min(n));
    let mut remaining: Vec<usize> = (0..n).collect();

    while selected.len() < top_k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;
        let mut best_relevance = f32::NEG_INFINITY;

        for (pos, &idx) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&(s, _)| cosine_similarity(&candidate_embeddings[idx], &candidate_embeddings[s]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if redundancy.is_finite() { redundancy } else { 0.0 };

            let score = lambda * relevance[idx] - (1.0 - lambda) * redundancy;
            let better = score > best_score
                || (score == best_score && relevance[idx] > best_relevance);
            if better {
                best_pos = pos;
                best_score = score;
                best_relevance = relevance[idx];
            }
        }

        let idx = remaining.remove(best_pos);
        selected.push((idx, best_score));
    }

    selected
}
