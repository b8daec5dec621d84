//! Transcript chunking into embeddable segments.

use vlore_models::Sentence;

/// Sentences are grouped into segments of 1-3 sentences, closing a
/// segment early once it carries enough text to embed meaningfully.
const MAX_SENTENCES_PER_CHUNK: usize = 3;
const TARGET_CHUNK_CHARS: usize = 160;

/// One chunk of consecutive sentences.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Index of the first sentence in the chunk
    pub first_sentence: usize,
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
}

/// Split a sentence list into consecutive 1-3 sentence chunks.
pub fn chunk_sentences(sentences: &[Sentence]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<&Sentence> = Vec::new();
    let mut current_chars = 0usize;

    let flush = |current: &mut Vec<&Sentence>, chunks: &mut Vec<Chunk>| {
        if current.is_empty() {
            return;
        }
        let text = current
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        chunks.push(Chunk {
            first_sentence: current[0].index,
            start_sec: current[0].start_sec,
            end_sec: current[current.len() - 1].end_sec,
            text,
        });
        current.clear();
    };

    for sentence in sentences {
        current_chars += sentence.text.chars().count();
        current.push(sentence);
        if current.len() >= MAX_SENTENCES_PER_CHUNK || current_chars >= TARGET_CHUNK_CHARS {
            flush(&mut current, &mut chunks);
            current_chars = 0;
        }
    }
    flush(&mut current, &mut chunks);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(texts: &[&str]) -> Vec<Sentence> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Sentence {
                index: i,
                start_sec: i as f64 * 2.0,
                end_sec: (i + 1) as f64 * 2.0,
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_groups_up_to_three_sentences() {
        let chunks = chunk_sentences(&sentences(&[
            "One.", "Two.", "Three.", "Four.", "Five.", "Six.", "Seven.",
        ]));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "One. Two. Three.");
        assert_eq!(chunks[0].first_sentence, 0);
        assert_eq!(chunks[1].first_sentence, 3);
        assert_eq!(chunks[2].text, "Seven.");
    }

    #[test]
    fn test_long_sentence_closes_chunk_early() {
        let long = "x".repeat(200);
        let chunks = chunk_sentences(&sentences(&[&long, "Short one."]));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].first_sentence, 0);
    }

    #[test]
    fn test_timings_span_the_chunk() {
        let chunks = chunk_sentences(&sentences(&["A.", "B.", "C."]));
        assert_eq!(chunks[0].start_sec, 0.0);
        assert_eq!(chunks[0].end_sec, 6.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_sentences(&[]).is_empty());
    }
}
