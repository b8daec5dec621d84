//! Topic-pipeline configuration: stop phrases, canonicalisation rules,
//! the closed category set and tuning knobs.
//!
//! Loaded once at startup into an immutable snapshot shared via `Arc`;
//! in-flight extractions always see a single consistent rule set.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{TopicError, TopicResult};

/// One entry of the closed category set.
#[derive(Debug, Clone, Copy)]
pub struct CategoryDescriptor {
    pub name: &'static str,
    /// Short textual descriptor embedded for similarity scoring
    pub descriptor: &'static str,
}

/// The fixed closed category set.
pub const CLOSED_CATEGORIES: &[CategoryDescriptor] = &[
    CategoryDescriptor { name: "Fitness", descriptor: "workouts, training, gym routines and exercise technique" },
    CategoryDescriptor { name: "Wellness", descriptor: "meditation, mindfulness, self care and mental health" },
    CategoryDescriptor { name: "Beauty", descriptor: "makeup, skincare, hair and cosmetics tutorials" },
    CategoryDescriptor { name: "Fashion", descriptor: "outfits, styling, clothing hauls and trends" },
    CategoryDescriptor { name: "Food", descriptor: "cooking, recipes, restaurants and food reviews" },
    CategoryDescriptor { name: "Travel", descriptor: "destinations, trip guides, flights and hotels" },
    CategoryDescriptor { name: "Technology", descriptor: "gadgets, software, coding and tech reviews" },
    CategoryDescriptor { name: "Gaming", descriptor: "video games, gameplay, esports and streaming" },
    CategoryDescriptor { name: "Education", descriptor: "lessons, study tips, science and how-to explainers" },
    CategoryDescriptor { name: "Finance", descriptor: "money, investing, budgeting and business advice" },
    CategoryDescriptor { name: "Comedy", descriptor: "sketches, jokes, pranks and humorous commentary" },
    CategoryDescriptor { name: "Music", descriptor: "songs, performances, instruments and music production" },
    CategoryDescriptor { name: "Art", descriptor: "drawing, painting, design and creative process" },
    CategoryDescriptor { name: "Parenting", descriptor: "family life, child care and parenting advice" },
    CategoryDescriptor { name: "Sports", descriptor: "athletics, matches, teams and sports commentary" },
];

/// Clustering backend for umbrella building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusteringMethod {
    /// Greedy modularity maximisation over the similarity graph
    #[default]
    Modularity,
    /// Threshold connected components, the deterministic fallback
    Components,
}

impl ClusteringMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusteringMethod::Modularity => "modularity",
            ClusteringMethod::Components => "components",
        }
    }
}

/// On-disk shape of `canonical_topics.json`.
#[derive(Debug, Deserialize)]
struct CanonicalRulesFile {
    #[serde(default)]
    merge_rules: HashMap<String, String>,
    #[serde(default)]
    auto_merge_threshold: AutoMergeThreshold,
}

#[derive(Debug, Deserialize)]
struct AutoMergeThreshold {
    cosine: f32,
    edit_distance_max: usize,
}

impl Default for AutoMergeThreshold {
    fn default() -> Self {
        Self {
            cosine: 0.9,
            edit_distance_max: 2,
        }
    }
}

/// Immutable topic-pipeline configuration snapshot.
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Normalised phrases excluded from candidates
    pub stop_phrases: HashSet<String>,
    /// Explicit raw -> canonical merges, applied before auto-merge
    pub merge_rules: HashMap<String, String>,
    pub auto_merge_cosine: f32,
    pub edit_distance_max: usize,

    /// MMR relevance/diversity balance
    pub mmr_lambda: f32,
    /// Topics kept per video
    pub top_k: usize,
    /// Sentence similarity floor for evidence attachment
    pub evidence_similarity: f32,
    /// Evidence entries kept per topic
    pub max_evidence: usize,

    /// Edge threshold of the umbrella similarity graph
    pub umbrella_threshold: f32,
    pub max_umbrellas: usize,
    pub min_cluster_size: usize,
    pub clustering: ClusteringMethod,

    /// Canonical topics fed to the category representation
    pub category_top_n: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            stop_phrases: HashSet::new(),
            merge_rules: HashMap::new(),
            auto_merge_cosine: 0.9,
            edit_distance_max: 2,
            mmr_lambda: 0.7,
            top_k: 10,
            evidence_similarity: 0.45,
            max_evidence: 5,
            umbrella_threshold: 0.7,
            max_umbrellas: 5,
            min_cluster_size: 2,
            clustering: ClusteringMethod::Modularity,
            category_top_n: 10,
        }
    }
}

impl TopicConfig {
    /// Load `stop_phrases.txt` and `canonical_topics.json` from the
    /// config directory. Missing files fall back to defaults; a present
    /// but malformed rules file is a startup error.
    pub async fn load(config_dir: &Path) -> TopicResult<Self> {
        let mut config = Self::default();

        let stop_path = config_dir.join("stop_phrases.txt");
        match tokio::fs::read_to_string(&stop_path).await {
            Ok(content) => {
                config.stop_phrases = content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(|l| l.to_lowercase())
                    .collect();
                info!(count = config.stop_phrases.len(), "loaded stop phrases");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %stop_path.display(), "no stop-phrase file, none excluded");
            }
            Err(e) => return Err(TopicError::config(format!("{}: {e}", stop_path.display()))),
        }

        let rules_path = config_dir.join("canonical_topics.json");
        match tokio::fs::read(&rules_path).await {
            Ok(bytes) => {
                let file: CanonicalRulesFile = serde_json::from_slice(&bytes)
                    .map_err(|e| TopicError::config(format!("{}: {e}", rules_path.display())))?;
                config.merge_rules = file
                    .merge_rules
                    .into_iter()
                    .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
                    .collect();
                config.auto_merge_cosine = file.auto_merge_threshold.cosine;
                config.edit_distance_max = file.auto_merge_threshold.edit_distance_max;
                info!(rules = config.merge_rules.len(), "loaded canonicalisation rules");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(TopicError::config(format!("{}: {e}", rules_path.display()))),
        }

        Ok(config)
    }

    /// Whether a normalised phrase is excluded.
    pub fn is_stop_phrase(&self, normalised: &str) -> bool {
        self.stop_phrases.contains(normalised)
    }
}
