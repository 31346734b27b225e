//! Pre-flight duplicate check.
//!
//! Skips the remote extraction call for media whose page is already indexed.
//! The storage layer's conditional insert stays the source of truth; two
//! items racing past the gate still produce a single record.

use std::sync::Arc;

use tracing::debug;

use mediascope_core::error::Result;
use mediascope_core::types::MediaClass;
use mediascope_storage::MediaStore;

#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn MediaStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self { store }
    }

    /// Whether `page_url` already has a record of `class`.
    pub async fn exists(&self, page_url: &str, class: MediaClass) -> Result<bool> {
        let present = self.store.exists_by_page_url(class, page_url).await?;
        if present {
            debug!(page_url, media_type = %class, "Already indexed");
        }
        Ok(present)
    }
}
