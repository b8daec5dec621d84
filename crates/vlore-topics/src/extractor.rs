//! Per-video topic extraction.
//!
//! Candidates come from the NLP engine (plus the title and hashtags),
//! are diversified with MMR against the whole-transcript embedding,
//! merged through the canonicaliser and backed with sentence evidence
//! before scoring.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use vlore_models::{
    AccountTagAggregate, Evidence, TopicRecord, TopicSource, TopicStats, TranscriptArtifact,
    VideoId,
};
use vlore_ports::{Embedder, NounPhraseEngine};

use crate::canonical::Canonicalizer;
use crate::config::TopicConfig;
use crate::error::TopicResult;
use crate::mmr::mmr_select;
use crate::similarity::cosine_similarity;

struct Candidate {
    raw: String,
    source: TopicSource,
}

pub struct TopicExtractor {
    embedder: Arc<dyn Embedder>,
    nlp: Arc<dyn NounPhraseEngine>,
    config: Arc<TopicConfig>,
}

impl TopicExtractor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        nlp: Arc<dyn NounPhraseEngine>,
        config: Arc<TopicConfig>,
    ) -> Self {
        Self {
            embedder,
            nlp,
            config,
        }
    }

    /// Extract diverse, canonicalised, evidence-backed topics for one
    /// transcript. Hashtags from the post metadata are extra candidates.
    pub async fn extract(
        &self,
        artifact: &TranscriptArtifact,
        hashtags: &[String],
    ) -> TopicResult<Vec<TopicRecord>> {
        let candidates = self.collect_candidates(artifact, hashtags).await?;
        if candidates.is_empty() || artifact.sentences.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.raw.clone()).collect();
        let candidate_embeddings = self.embedder.encode_batch(&texts).await?;
        let doc_embedding = self.embedder.encode(&artifact.text).await?;
        let sentence_texts: Vec<String> = artifact
            .sentences
            .iter()
            .map(|s| s.text.clone())
            .collect();
        let sentence_embeddings = self.embedder.encode_batch(&sentence_texts).await?;

        let picks = mmr_select(
            &candidate_embeddings,
            &doc_embedding,
            self.config.mmr_lambda,
            self.config.top_k,
        );

        let mut canonicalizer = Canonicalizer::new(&self.config);
        let mut records = Vec::with_capacity(picks.len());
        for (idx, mmr_score) in picks {
            let candidate = &candidates[idx];
            let embedding = &candidate_embeddings[idx];
            let canonical = canonicalizer.canonicalize(&candidate.raw, embedding);

            let evidence =
                self.attach_evidence(&candidate.raw, embedding, artifact, &sentence_embeddings);
            if evidence.is_empty() {
                // No sentence to ground the topic in this video
                continue;
            }

            let confidence = confidence_score(mmr_score, evidence.len());
            records.push(TopicRecord {
                tag: candidate.raw.clone(),
                canonical,
                score_mmr: mmr_score,
                confidence,
                stats: TopicStats {
                    distinct_sentences: evidence.len(),
                    mmr_score,
                },
                evidence,
                source: candidate.source,
            });
        }

        debug!(
            video_id = %artifact.meta.video_id,
            topics = records.len(),
            "topic extraction complete"
        );
        Ok(records)
    }

    async fn collect_candidates(
        &self,
        artifact: &TranscriptArtifact,
        hashtags: &[String],
    ) -> TopicResult<Vec<Candidate>> {
        let mut seen = std::collections::HashSet::new();
        let mut candidates = Vec::new();
        let mut push = |raw: String, source: TopicSource| {
            if self.accept_candidate(&raw) && seen.insert(raw.clone()) {
                candidates.push(Candidate { raw, source });
            }
        };

        for phrase in self.nlp.noun_phrases(&artifact.text).await? {
            push(normalise_phrase(&phrase.lemma), TopicSource::Transcript);
        }
        for phrase in self.nlp.noun_phrases(&artifact.meta.title).await? {
            push(normalise_phrase(&phrase.lemma), TopicSource::Title);
        }
        for hashtag in hashtags {
            push(
                normalise_phrase(hashtag.trim_start_matches('#')),
                TopicSource::Hashtag,
            );
        }
        Ok(candidates)
    }

    fn accept_candidate(&self, normalised: &str) -> bool {
        normalised.len() >= 4
            && normalised.split_whitespace().any(|token| token.len() > 3)
            && !self.config.is_stop_phrase(normalised)
    }

    /// Supporting sentences by lexical containment or embedding
    /// similarity, best first, capped. Falls back to the single closest
    /// sentence so every emitted topic stays grounded in its video.
    fn attach_evidence(
        &self,
        raw: &str,
        topic_embedding: &[f32],
        artifact: &TranscriptArtifact,
        sentence_embeddings: &[Vec<f32>],
    ) -> Vec<Evidence> {
        let mut scored: Vec<(usize, f32, bool)> = artifact
            .sentences
            .iter()
            .zip(sentence_embeddings)
            .map(|(sentence, embedding)| {
                let similarity = cosine_similarity(topic_embedding, embedding);
                let lexical = sentence.text.to_lowercase().contains(raw);
                (sentence.index, similarity, lexical)
            })
            .collect();

        let mut matching: Vec<(usize, f32)> = scored
            .iter()
            .filter(|(_, similarity, lexical)| {
                *lexical || *similarity >= self.config.evidence_similarity
            })
            .map(|&(index, similarity, _)| (index, similarity))
            .collect();

        if matching.is_empty() {
            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            matching = scored.first().map(|&(index, sim, _)| (index, sim)).into_iter().collect();
        } else {
            matching.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        }

        matching
            .into_iter()
            .take(self.config.max_evidence)
            .map(|(index, _)| {
                let sentence = &artifact.sentences[index];
                Evidence {
                    sentence_index: sentence.index,
                    start_sec: sentence.start_sec,
                    end_sec: sentence.end_sec,
                    text: sentence.text.clone(),
                }
            })
            .collect()
    }
}

/// Confidence from the selection score and evidence support:
/// a clipped normalisation of the MMR score plus a logarithmic
/// evidence boost, saturating at 1.
fn confidence_score(mmr_score: f32, evidence_count: usize) -> f32 {
    let norm = ((mmr_score + 0.5) / 1.2).clamp(0.0, 1.0);
    let boost = ((1.0 + evidence_count as f32).ln() / 10.0).min(0.3);
    (norm + boost).min(1.0)
}

/// Lowercase, strip punctuation, collapse whitespace.
fn normalise_phrase(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Roll per-video records up into account-level aggregates, grouped by
/// canonical form and ranked by combined score.
pub fn aggregate_account(
    per_video: &[(VideoId, Vec<TopicRecord>)],
) -> Vec<AccountTagAggregate> {
    // Engagement weighting has no data source yet; the multiplier stays
    // at 1.0 so the ranking is frequency times average score.
    const ENGAGEMENT_WEIGHT: f32 = 1.0;

    let mut grouped: HashMap<&str, (Vec<f32>, Vec<&VideoId>)> = HashMap::new();
    for (video_id, records) in per_video {
        for record in records {
            let entry = grouped.entry(&record.canonical).or_default();
            entry.0.push(record.confidence);
            if !entry.1.contains(&video_id) {
                entry.1.push(video_id);
            }
        }
    }

    let mut aggregates: Vec<AccountTagAggregate> = grouped
        .into_iter()
        .map(|(canonical, (scores, videos))| {
            let frequency = videos.len();
            let avg_score = scores.iter().sum::<f32>() / scores.len() as f32;
            let mut video_ids: Vec<String> =
                videos.iter().map(|v| v.as_str().to_string()).collect();
            video_ids.sort();
            AccountTagAggregate {
                canonical: canonical.to_string(),
                frequency,
                avg_score,
                combined_score: frequency as f32 * avg_score * ENGAGEMENT_WEIGHT,
                video_ids,
            }
        })
        .collect();

    aggregates.sort_by(|a, b| {
        b.combined_score
            .total_cmp(&a.combined_score)
            .then_with(|| a.canonical.cmp(&b.canonical))
    });
    aggregates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vlore_models::{CreatorHandle, Sentence, TranscriptMeta};
    use vlore_ports::testing::{FakeNounPhrases, StubEmbedder};

    fn artifact(text: &str, title: &str) -> TranscriptArtifact {
        let sentences: Vec<Sentence> = text
            .split_inclusive('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, s)| Sentence {
                index: i,
                start_sec: i as f64 * 3.0,
                end_sec: (i + 1) as f64 * 3.0,
                text: s.to_string(),
            })
            .collect();
        TranscriptArtifact {
            meta: TranscriptMeta {
                creator: CreatorHandle::new("tester").unwrap(),
                video_id: "v1".into(),
                title: title.into(),
                url: "https://v/1".into(),
                duration_sec: Some(sentences.len() as f64 * 3.0),
                language: Some("en".into()),
                confidence: Some(0.9),
                processed_at: Utc::now(),
            },
            text: text.into(),
            sentences,
        }
    }

    fn extractor(config: TopicConfig) -> TopicExtractor {
        TopicExtractor::new(
            Arc::new(StubEmbedder::default()),
            Arc::new(FakeNounPhrases::new()),
            Arc::new(config),
        )
    }

    #[test]
    fn test_normalise_phrase() {
        assert_eq!(normalise_phrase("Morning  Meditation!"), "morning meditation");
        assert_eq!(normalise_phrase("#GutHealth"), "guthealth");
        assert_eq!(normalise_phrase("it's fine"), "it's fine");
    }

    #[test]
    fn test_confidence_formula() {
        // norm = (0.1 + 0.5) / 1.2 = 0.5; boost = ln(2)/10
        let c = confidence_score(0.1, 1);
        assert!((c - (0.5 + (2.0f32).ln() / 10.0)).abs() < 1e-5);

        // Saturation at 1
        assert_eq!(confidence_score(2.0, 100), 1.0);
        // Heavy negative scores clamp to boost only
        let floor = confidence_score(-5.0, 1);
        assert!((floor - (2.0f32).ln() / 10.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_extract_produces_grounded_records() {
        let text = "Morning meditation changed my life. Deep breathing exercises calm the mind. \
                    Meditation practice every single day. Cold showers help with focus.";
        let art = artifact(text, "Morning meditation routine");
        let records = extractor(TopicConfig::default())
            .extract(&art, &["#meditation".into()])
            .await
            .unwrap();

        assert!(!records.is_empty());
        assert!(records.len() <= 10);
        for record in &records {
            assert!(!record.evidence.is_empty(), "{} has no evidence", record.tag);
            assert!((0.0..=1.0).contains(&record.confidence));
            for ev in &record.evidence {
                assert!(ev.sentence_index < art.sentences.len());
                assert!(ev.start_sec <= ev.end_sec);
            }
        }
    }

    #[tokio::test]
    async fn test_extract_respects_stop_phrases() {
        let mut config = TopicConfig::default();
        config.stop_phrases.insert("morning meditation".into());
        let art = artifact("Morning meditation helps. Sourdough baking is fun.", "");
        let records = extractor(config).extract(&art, &[]).await.unwrap();
        assert!(records.iter().all(|r| r.tag != "morning meditation"));
    }

    #[tokio::test]
    async fn test_extract_empty_transcript() {
        let art = artifact("", "");
        let records = extractor(TopicConfig::default())
            .extract(&art, &[])
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_extract_is_deterministic() {
        let text = "Strength training basics. Protein intake matters. Rest days are essential.";
        let art = artifact(text, "Training tips");
        let e = extractor(TopicConfig::default());
        let a = e.extract(&art, &[]).await.unwrap();
        let b = e.extract(&art, &[]).await.unwrap();
        let tags_a: Vec<&str> = a.iter().map(|r| r.tag.as_str()).collect();
        let tags_b: Vec<&str> = b.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags_a, tags_b);
    }

    #[test]
    fn test_aggregate_account_groups_by_canonical() {
        let record = |canonical: &str, confidence: f32| TopicRecord {
            tag: canonical.to_string(),
            canonical: canonical.to_string(),
            score_mmr: 0.3,
            confidence,
            evidence: vec![Evidence {
                sentence_index: 0,
                start_sec: 0.0,
                end_sec: 1.0,
                text: "e".into(),
            }],
            source: TopicSource::Transcript,
            stats: TopicStats::default(),
        };

        let per_video = vec![
            ("v1".into(), vec![record("yoga", 0.8), record("baking", 0.6)]),
            ("v2".into(), vec![record("yoga", 0.6)]),
        ];
        let aggregates = aggregate_account(&per_video);

        assert_eq!(aggregates.len(), 2);
        let yoga = &aggregates[0];
        assert_eq!(yoga.canonical, "yoga");
        assert_eq!(yoga.frequency, 2);
        assert!((yoga.avg_score - 0.7).abs() < 1e-6);
        assert!((yoga.combined_score - 1.4).abs() < 1e-6);
        assert_eq!(yoga.video_ids, vec!["v1", "v2"]);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate_account(&[]).is_empty());
    }
}
