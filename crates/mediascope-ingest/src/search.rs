//! Similarity search by example.
//!
//! SearchOrchestrator extracts the query media's vector with the same
//! extractor used for ingestion and ranks stored records of the same class
//! against it.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use mediascope_core::config::MediascopeConfig;
use mediascope_core::error::Result;
use mediascope_core::types::{MediaClass, MediaInput, SearchResult, VectorDimensions};
use mediascope_storage::MediaStore;

use crate::extraction::{self, FeatureExtractor};

#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub dimensions: VectorDimensions,
    pub default_limit: usize,
    pub max_limit: usize,
    pub apply_denoising: bool,
}

impl SearchSettings {
    pub fn from_config(config: &MediascopeConfig) -> Self {
        Self {
            dimensions: config.storage.dimensions(),
            default_limit: config.search.default_limit,
            max_limit: config.search.max_limit,
            apply_denoising: config.extractor.apply_denoising,
        }
    }

    /// Missing or non-positive limits fall back to the default; everything
    /// is capped at the maximum.
    pub fn resolve_limit(&self, requested: Option<i64>) -> usize {
        let limit = match requested {
            Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
            _ => self.default_limit,
        };
        limit.min(self.max_limit).max(1)
    }
}

pub struct SearchOrchestrator {
    store: Arc<dyn MediaStore>,
    extractor: Arc<dyn FeatureExtractor>,
    settings: SearchSettings,
}

impl SearchOrchestrator {
    pub fn new(
        store: Arc<dyn MediaStore>,
        extractor: Arc<dyn FeatureExtractor>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            settings,
        }
    }

    /// Rank stored media of `class` by similarity to `input`.
    pub async fn search(
        &self,
        input: &MediaInput,
        class: MediaClass,
        limit: Option<i64>,
    ) -> Result<Vec<SearchResult>> {
        let limit = self.settings.resolve_limit(limit);
        let reference = match input {
            MediaInput::Url(url) => url.clone(),
            MediaInput::Bytes { .. } => format!("query-{}", Uuid::new_v4()),
        };

        let query = extraction::extract_single(
            self.extractor.as_ref(),
            input,
            class,
            &reference,
            self.settings.apply_denoising,
            self.settings.dimensions.get(class),
        )
        .await?;

        let results = self.store.find_similar(class, &query, limit).await?;
        info!(
            query = %input.describe(),
            media_type = %class,
            limit,
            found = results.len(),
            "Similarity search complete"
        );
        Ok(results)
    }
}
