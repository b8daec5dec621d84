//! Canonicalisation: a total, deterministic map from raw topic phrases
//! to their merged canonical forms.
//!
//! Precedence: explicit merge rules, then auto-merge against the
//! already-chosen canonical set by embedding similarity or edit
//! distance, otherwise the raw phrase founds a new canonical.

use std::collections::HashMap;

use crate::config::TopicConfig;
use crate::similarity::{cosine_similarity, levenshtein};

/// Accumulates the canonical set for one scope (a video or an account)
/// while mapping raw phrases into it.
pub struct Canonicalizer {
    merge_rules: HashMap<String, String>,
    cosine_threshold: f32,
    edit_distance_max: usize,
    /// Chosen canonicals in insertion order with their embeddings
    chosen: Vec<(String, Vec<f32>)>,
}

impl Canonicalizer {
    pub fn new(config: &TopicConfig) -> Self {
        Self {
            merge_rules: config.merge_rules.clone(),
            cosine_threshold: config.auto_merge_cosine,
            edit_distance_max: config.edit_distance_max,
            chosen: Vec::new(),
        }
    }

    /// Map one raw phrase to its canonical form, extending the chosen
    /// set when no merge applies.
    pub fn canonicalize(&mut self, raw: &str, embedding: &[f32]) -> String {
        if let Some(target) = self.merge_rules.get(raw) {
            let target = target.clone();
            self.remember(&target, embedding);
            return target;
        }

        for (canonical, canonical_embedding) in &self.chosen {
            if cosine_similarity(embedding, canonical_embedding) >= self.cosine_threshold
                || levenshtein(raw, canonical) <= self.edit_distance_max
            {
                return canonical.clone();
            }
        }

        self.chosen.push((raw.to_string(), embedding.to_vec()));
        raw.to_string()
    }

    /// Canonicals chosen so far, in insertion order.
    pub fn chosen(&self) -> impl Iterator<Item = &str> {
        self.chosen.iter().map(|(c, _)| c.as_str())
    }

    fn remember(&mut self, canonical: &str, embedding: &[f32]) {
        if !self.chosen.iter().any(|(c, _)| c == canonical) {
            self.chosen.push((canonical.to_string(), embedding.to_vec()));
        }
    }
}
