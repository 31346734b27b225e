//! Application state shared across all route handlers.
//!
//! AppState holds the services built from one configuration. It is passed
//! to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use mediascope_core::config::MediascopeConfig;
use mediascope_ingest::{
    BatchProcessor, DirectIndexer, FeatureExtractor, PipelineSettings, ScrapeRequester,
    ScrapeService, SearchOrchestrator, SearchSettings,
};
use mediascope_storage::MediaStore;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MediascopeConfig>,
    pub store: Arc<dyn MediaStore>,
    pub pipeline: Arc<BatchProcessor>,
    pub search: Arc<SearchOrchestrator>,
    pub indexer: Arc<DirectIndexer>,
    pub scraper: Arc<ScrapeRequester>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Compose the services over a store and the two remote collaborators.
    pub fn new(
        config: MediascopeConfig,
        store: Arc<dyn MediaStore>,
        extractor: Arc<dyn FeatureExtractor>,
        scrape_service: Arc<dyn ScrapeService>,
    ) -> Self {
        let pipeline = BatchProcessor::new(
            Arc::clone(&store),
            Arc::clone(&extractor),
            PipelineSettings::from_config(&config),
        );
        let search = SearchOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&extractor),
            SearchSettings::from_config(&config),
        );
        let indexer = DirectIndexer::new(
            Arc::clone(&store),
            extractor,
            config.storage.dimensions(),
            config.extractor.apply_denoising,
        );
        let scraper = ScrapeRequester::new(scrape_service, &config.scraper);

        Self {
            config: Arc::new(config),
            store,
            pipeline: Arc::new(pipeline),
            search: Arc::new(search),
            indexer: Arc::new(indexer),
            scraper: Arc::new(scraper),
            start_time: Instant::now(),
        }
    }
}
