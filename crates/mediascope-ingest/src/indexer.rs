//! Single-item indexing outside of crawl batches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use mediascope_core::error::{MediaError, Result};
use mediascope_core::types::{InsertOutcome, MediaClass, MediaInput, VectorDimensions};
use mediascope_storage::MediaStore;

use crate::extraction::{self, FeatureExtractor};

/// Result of a direct index call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOutcome {
    /// Key the vector is stored under.
    pub page_url: String,
    #[serde(rename = "media_type")]
    pub class: MediaClass,
    /// False when a record for the key already existed.
    pub inserted: bool,
}

pub struct DirectIndexer {
    store: Arc<dyn MediaStore>,
    extractor: Arc<dyn FeatureExtractor>,
    dimensions: VectorDimensions,
    apply_denoising: bool,
}

impl DirectIndexer {
    pub fn new(
        store: Arc<dyn MediaStore>,
        extractor: Arc<dyn FeatureExtractor>,
        dimensions: VectorDimensions,
        apply_denoising: bool,
    ) -> Self {
        Self {
            store,
            extractor,
            dimensions,
            apply_denoising,
        }
    }

    /// Extract and store one piece of media.
    ///
    /// The record key is `page_url` when given, else the media URL, else a
    /// synthetic `upload://` key for uploads.
    pub async fn index_media(
        &self,
        input: &MediaInput,
        class: MediaClass,
        page_url: Option<&str>,
    ) -> Result<IndexOutcome> {
        let key = storage_key(input, page_url)?;

        let vector = extraction::extract_single(
            self.extractor.as_ref(),
            input,
            class,
            &key,
            self.apply_denoising,
            self.dimensions.get(class),
        )
        .await?;

        let outcome = self.store.insert_if_absent(class, &key, &vector).await?;
        info!(
            media = %input.describe(),
            page_url = %key,
            media_type = %class,
            ?outcome,
            "Indexed media"
        );

        Ok(IndexOutcome {
            page_url: key,
            class,
            inserted: outcome == InsertOutcome::Inserted,
        })
    }
}

fn storage_key(input: &MediaInput, page_url: Option<&str>) -> Result<String> {
    if let Some(url) = page_url.map(str::trim).filter(|s| !s.is_empty()) {
        return Ok(url.to_string());
    }
    match input {
        MediaInput::Url(url) if !url.trim().is_empty() => Ok(url.trim().to_string()),
        MediaInput::Url(_) => Err(MediaError::InvalidInput("media_url must not be empty".to_string())),
        MediaInput::Bytes { filename, .. } => {
            let name = if filename.is_empty() { "upload" } else { filename.as_str() };
            Ok(format!("upload://{}/{}", Uuid::new_v4(), name))
        }
    }
}
