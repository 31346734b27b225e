//! The storage seam used by ingestion and search.

use async_trait::async_trait;

use mediascope_core::error::Result;
use mediascope_core::types::{InsertOutcome, MediaClass, SearchResult, VectorRecord};

/// Persistent map from `(class, page_url)` to a feature vector.
///
/// All methods are safe to call concurrently. Implementations must make
/// `insert_if_absent` atomic: of several concurrent inserts for the same key
/// exactly one reports [`InsertOutcome::Inserted`].
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Whether a record for `page_url` exists in the class's table.
    async fn exists_by_page_url(&self, class: MediaClass, page_url: &str) -> Result<bool>;

    /// Store `vector` under `page_url` unless a record already exists.
    async fn insert_if_absent(
        &self,
        class: MediaClass,
        page_url: &str,
        vector: &[f32],
    ) -> Result<InsertOutcome>;

    /// The `limit` records most similar to `query`, best first. Ties are
    /// broken by page URL so repeated queries return identical lists.
    async fn find_similar(
        &self,
        class: MediaClass,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// The stored record for `page_url`, if any.
    async fn find_by_page_url(&self, class: MediaClass, page_url: &str)
        -> Result<Option<VectorRecord>>;

    /// Number of records of `class`.
    async fn count(&self, class: MediaClass) -> Result<u64>;
}
