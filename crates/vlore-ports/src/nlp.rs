//! Noun-phrase extraction port.

use async_trait::async_trait;

use crate::error::PortResult;

/// A noun phrase with its character span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NounPhrase {
    /// Surface form as it appears in the text
    pub text: String,
    /// Lemmatised form
    pub lemma: String,
    pub start_char: usize,
    pub end_char: usize,
}

/// NLP engine producing lemmatised noun phrases.
///
/// Unavailability at startup is fatal for topic extraction; the
/// constructor of the concrete engine is expected to fail fast.
#[async_trait]
pub trait NounPhraseEngine: Send + Sync {
    async fn noun_phrases(&self, text: &str) -> PortResult<Vec<NounPhrase>>;
}
