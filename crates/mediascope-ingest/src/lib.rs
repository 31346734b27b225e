//! Mediascope Ingest crate - extraction client, batch pipeline, search and indexing.
//!
//! Talks to the feature-extraction and scraper services, runs scraped
//! batches through dedup, extraction and storage with bounded concurrency,
//! and serves query-by-example search and direct indexing.

pub mod dedup;
pub mod extraction;
pub mod indexer;
pub mod media;
pub mod pipeline;
pub mod scraper;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;

pub use dedup::DedupGate;
pub use extraction::{
    BytesItem, ExtractionStatus, FeatureExtractor, FeatureResult, HttpFeatureExtractor, UrlItem,
};
pub use indexer::{DirectIndexer, IndexOutcome};
pub use pipeline::{BatchProcessor, ItemOutcome, PipelineSettings};
pub use scraper::{HttpScraperClient, ScrapeRequester, ScrapeService};
pub use search::{SearchOrchestrator, SearchSettings};
