//! Closed-set category classification for a creator.
//!
//! The creator is represented as the mean of its strongest canonical
//! topic embeddings (or a deterministic sample of sentence embeddings
//! when no topics exist yet) and scored against the category
//! descriptors by cosine similarity.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use vlore_models::{AccountTagAggregate, CategoryAssignment};
use vlore_ports::Embedder;

use crate::config::{TopicConfig, CLOSED_CATEGORIES};
use crate::error::{TopicError, TopicResult};
use crate::similarity::cosine_similarity;

pub struct CategoryClassifier {
    embedder: Arc<dyn Embedder>,
    config: Arc<TopicConfig>,
    /// Embeddings of the category descriptors, computed once
    category_embeddings: Vec<(String, Vec<f32>)>,
}

impl CategoryClassifier {
    /// Embed the category descriptors once up front.
    pub async fn new(embedder: Arc<dyn Embedder>, config: Arc<TopicConfig>) -> TopicResult<Self> {
        let descriptors: Vec<String> = CLOSED_CATEGORIES
            .iter()
            .map(|c| format!("{}: {}", c.name, c.descriptor))
            .collect();
        let embeddings = embedder.encode_batch(&descriptors).await?;
        let category_embeddings = CLOSED_CATEGORIES
            .iter()
            .map(|c| c.name.to_string())
            .zip(embeddings)
            .collect();
        Ok(Self {
            embedder,
            config,
            category_embeddings,
        })
    }

    /// Classify a creator from its aggregated topics, falling back to a
    /// deterministic evenly-spaced sample of sentences when the account
    /// has no topics yet.
    pub async fn classify(
        &self,
        aggregates: &[AccountTagAggregate],
        fallback_sentences: &[String],
    ) -> TopicResult<CategoryAssignment> {
        let representation = if aggregates.is_empty() {
            let sample = evenly_spaced_sample(fallback_sentences, 20);
            if sample.is_empty() {
                return Err(TopicError::config(
                    "nothing to classify: no topics and no sentences",
                ));
            }
            mean_embedding(&self.embedder.encode_batch(&sample).await?)
        } else {
            let top: Vec<String> = aggregates
                .iter()
                .take(self.config.category_top_n)
                .map(|a| a.canonical.clone())
                .collect();
            mean_embedding(&self.embedder.encode_batch(&top).await?)
        };

        let mut all_scores = BTreeMap::new();
        let mut best: Option<(&str, f32)> = None;
        for (name, embedding) in &self.category_embeddings {
            let score = cosine_similarity(&representation, embedding);
            all_scores.insert(name.clone(), score);
            let better = match best {
                None => true,
                Some((_, best_score)) => score > best_score,
            };
            if better {
                best = Some((name.as_str(), score));
            }
        }

        let (category, confidence) = best.expect("closed category set is non-empty");
        debug!(category = %category, confidence, "category assigned");
        Ok(CategoryAssignment {
            category: category.to_string(),
            confidence,
            all_scores,
        })
    }
}

fn mean_embedding(embeddings: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = embeddings.first() else {
        return Vec::new();
    };
    let mut mean = vec![0.0f32; first.len()];
    for embedding in embeddings {
        for (m, v) in mean.iter_mut().zip(embedding) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= embeddings.len() as f32;
    }
    mean
}

/// Up to `n` items spread evenly across the slice; reproducible, unlike
/// a random sample.
fn evenly_spaced_sample(items: &[String], n: usize) -> Vec<String> {
    if items.len() <= n {
        return items.to_vec();
    }
    (0..n)
        .map(|i| items[i * items.len() / n].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlore_ports::testing::StubEmbedder;

    fn aggregate(canonical: &str) -> AccountTagAggregate {
        AccountTagAggregate {
            canonical: canonical.to_string(),
            frequency: 2,
            avg_score: 0.7,
            combined_score: 1.4,
            video_ids: vec!["v1".into()],
        }
    }

    async fn classifier() -> CategoryClassifier {
        CategoryClassifier::new(
            Arc::new(StubEmbedder::default()),
            Arc::new(TopicConfig::default()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_assignment_is_argmax_of_scores() {
        let c = classifier().await;
        let assignment = c
            .classify(&[aggregate("meditation"), aggregate("mindfulness")], &[])
            .await
            .unwrap();

        assert_eq!(assignment.all_scores.len(), 15);
        let max = assignment
            .all_scores
            .values()
            .cloned()
            .fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(assignment.all_scores[&assignment.category], max);
        assert_eq!(assignment.confidence, max);
    }

    #[tokio::test]
    async fn test_deterministic_given_fixed_inputs() {
        let c = classifier().await;
        let aggregates = [aggregate("workout"), aggregate("gym routine")];
        let a = c.classify(&aggregates, &[]).await.unwrap();
        let b = c.classify(&aggregates, &[]).await.unwrap();
        assert_eq!(a.category, b.category);
        assert_eq!(a.all_scores, b.all_scores);
    }

    #[tokio::test]
    async fn test_sentence_fallback() {
        let c = classifier().await;
        let sentences: Vec<String> = (0..50)
            .map(|i| format!("sentence number {i} about cooking recipes"))
            .collect();
        let assignment = c.classify(&[], &sentences).await.unwrap();
        assert!(!assignment.category.is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_classify_is_error() {
        let c = classifier().await;
        assert!(c.classify(&[], &[]).await.is_err());
    }

    #[test]
    fn test_evenly_spaced_sample() {
        let items: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        let sample = evenly_spaced_sample(&items, 20);
        assert_eq!(sample.len(), 20);
        assert_eq!(sample[0], "0");
        assert_eq!(sample[1], "5");

        let small: Vec<String> = vec!["a".into()];
        assert_eq!(evenly_spaced_sample(&small, 20), small);
    }
}
