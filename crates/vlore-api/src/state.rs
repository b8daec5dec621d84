//! Application state: engines constructed once, shared as handles.

use std::sync::Arc;

use vlore_ingest::{build_context, IngestConfig, JobManager};
use vlore_ports::{Embedder, NounPhraseEngine, Transcriber, VideoSource};
use vlore_search::{SearchConfig, SearchEngine, VectorIndex};
use vlore_store::{AccountIndex, Layout, TopicsStore, TranscriptStore};
use vlore_topics::{CategoryClassifier, TopicConfig, TopicExtractor, UmbrellaBuilder};

use crate::config::ApiConfig;

/// The external engines, constructed by the caller and injected once.
pub struct Engines {
    pub source: Arc<dyn VideoSource>,
    pub transcriber: Arc<dyn Transcriber>,
    pub embedder: Arc<dyn Embedder>,
    pub nlp: Arc<dyn NounPhraseEngine>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub layout: Layout,
    pub account_index: AccountIndex,
    pub transcripts: TranscriptStore,
    pub topics: TopicsStore,
    pub search: Arc<SearchEngine>,
    pub vector_index: Arc<VectorIndex>,
    pub manager: Arc<JobManager>,
    pub source: Arc<dyn VideoSource>,
}

impl AppState {
    /// Wire stores, topic pipeline, search and job manager around the
    /// injected engines.
    pub async fn new(config: ApiConfig, engines: Engines) -> anyhow::Result<Self> {
        let layout = Layout::new(&config.accounts_dir, &config.data_dir);
        let topic_config = Arc::new(TopicConfig::load(&config.config_dir).await?);

        let extractor = Arc::new(TopicExtractor::new(
            Arc::clone(&engines.embedder),
            Arc::clone(&engines.nlp),
            Arc::clone(&topic_config),
        ));
        let classifier = Arc::new(
            CategoryClassifier::new(Arc::clone(&engines.embedder), Arc::clone(&topic_config))
                .await?,
        );
        let umbrella = Arc::new(UmbrellaBuilder::new(topic_config));

        let vector_index = Arc::new(
            VectorIndex::load(layout.clone(), engines.embedder.dimension()).await?,
        );
        let search = Arc::new(SearchEngine::new(
            Arc::clone(&engines.embedder),
            Arc::clone(&vector_index),
            TranscriptStore::new(layout.clone()),
            TopicsStore::new(layout.clone()),
            SearchConfig::default(),
        ));

        let ctx = build_context(
            Arc::clone(&engines.source),
            engines.transcriber,
            engines.embedder,
            layout.clone(),
            extractor,
            classifier,
            umbrella,
            Arc::clone(&search),
            IngestConfig::new(&config.work_dir),
        );
        let manager = Arc::new(JobManager::new(Arc::new(ctx)));

        Ok(Self {
            config,
            account_index: AccountIndex::new(layout.clone()),
            transcripts: TranscriptStore::new(layout.clone()),
            topics: TopicsStore::new(layout.clone()),
            layout,
            search,
            vector_index,
            manager,
            source: engines.source,
        })
    }
}
