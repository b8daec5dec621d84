//! Topic records, account aggregates, categories and umbrella clusters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a topic candidate surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopicSource {
    #[default]
    Transcript,
    Title,
    Hashtag,
}

/// Sentence-level justification attached to a topic, with timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Evidence {
    pub sentence_index: usize,
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
}

/// Per-topic selection statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TopicStats {
    /// Distinct sentences supporting the topic
    pub distinct_sentences: usize,
    /// Marginal-relevance score at selection time
    pub mmr_score: f32,
}

/// One extracted topic for one video.
///
/// `tag` is the surface phrase; `canonical` the merged form. Every record
/// carries at least one evidence entry drawn from the same video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TopicRecord {
    pub tag: String,
    pub canonical: String,
    pub score_mmr: f32,
    /// 0..=1
    pub confidence: f32,
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub source: TopicSource,
    #[serde(default)]
    pub stats: TopicStats,
}

/// Account-level rollup for one canonical topic.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountTagAggregate {
    pub canonical: String,
    /// Number of videos the topic appears in
    pub frequency: usize,
    pub avg_score: f32,
    /// frequency * avg_score * engagement weight
    pub combined_score: f32,
    pub video_ids: Vec<String>,
}

/// Closed-set category assignment for a creator.
///
/// `category` is always the argmax of `all_scores`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryAssignment {
    pub category: String,
    /// 0..=1
    pub confidence: f32,
    pub all_scores: BTreeMap<String, f32>,
}

/// A cluster of canonical topics with a generated short label.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UmbrellaCluster {
    pub id: usize,
    /// 1-2 words, Title Case
    pub label: String,
    pub members: Vec<String>,
    pub member_count: usize,
    pub total_frequency: usize,
    pub avg_coherence: f32,
    pub video_ids: Vec<String>,
}

/// Persisted umbrella artifact with the parameters that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UmbrellaFile {
    pub umbrellas: Vec<UmbrellaCluster>,
    pub threshold: f32,
    /// Clustering method that produced the partition
    pub method: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_record_serde_roundtrip() {
        let record = TopicRecord {
            tag: "breathing exercises".into(),
            canonical: "breathing exercise".into(),
            score_mmr: 0.42,
            confidence: 0.8,
            evidence: vec![Evidence {
                sentence_index: 3,
                start_sec: 12.0,
                end_sec: 15.5,
                text: "try these breathing exercises".into(),
            }],
            source: TopicSource::Transcript,
            stats: TopicStats {
                distinct_sentences: 1,
                mmr_score: 0.42,
            },
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: TopicRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.canonical, "breathing exercise");
        assert_eq!(back.evidence.len(), 1);
        assert_eq!(back.source, TopicSource::Transcript);
    }

    #[test]
    fn test_source_defaults_to_transcript() {
        let json = r#"{"tag":"x","canonical":"x","score_mmr":0.1,"confidence":0.5,"evidence":[]}"#;
        let record: TopicRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source, TopicSource::Transcript);
    }
}
