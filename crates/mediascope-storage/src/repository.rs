//! SQLite-backed [`MediaStore`].
//!
//! Queries are plain SQL over the per-class tables. Each async method moves
//! its work onto a blocking thread and borrows a pooled connection there.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use mediascope_core::codec;
use mediascope_core::error::{MediaError, Result};
use mediascope_core::types::{InsertOutcome, MediaClass, SearchResult, VectorRecord};

use crate::db::Database;
use crate::store::MediaStore;

/// Feature-vector repository over a pooled [`Database`].
#[derive(Clone, Debug)]
pub struct MediaRepository {
    db: Arc<Database>,
}

impl MediaRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn check_vector(&self, class: MediaClass, vector: &[f32]) -> Result<()> {
        let expected = self.db.dimensions().get(class);
        if vector.len() != expected {
            return Err(MediaError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        if let Some(index) = codec::first_non_finite(vector) {
            return Err(MediaError::InvalidVectorValue { index });
        }
        Ok(())
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| MediaError::StorageUnavailable(format!("Storage task failed: {}", e)))?
    }
}

#[async_trait]
impl MediaStore for MediaRepository {
    async fn exists_by_page_url(&self, class: MediaClass, page_url: &str) -> Result<bool> {
        let page_url = page_url.to_string();
        self.blocking(move |conn| exists(conn, class, &page_url)).await
    }

    async fn insert_if_absent(
        &self,
        class: MediaClass,
        page_url: &str,
        vector: &[f32],
    ) -> Result<InsertOutcome> {
        if page_url.trim().is_empty() {
            return Err(MediaError::InvalidInput("page_url must not be empty".to_string()));
        }
        self.check_vector(class, vector)?;

        let page_url = page_url.to_string();
        let blob = codec::encode(vector);
        let outcome = self
            .blocking(move |conn| insert(conn, class, &page_url, &blob))
            .await?;
        Ok(outcome)
    }

    async fn find_similar(
        &self,
        class: MediaClass,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Err(MediaError::InvalidInput("limit must be positive".to_string()));
        }
        self.check_vector(class, query)?;

        let blob = codec::encode(query);
        self.blocking(move |conn| similar(conn, class, &blob, limit))
            .await
    }

    async fn find_by_page_url(
        &self,
        class: MediaClass,
        page_url: &str,
    ) -> Result<Option<VectorRecord>> {
        let page_url = page_url.to_string();
        self.blocking(move |conn| by_page_url(conn, class, &page_url))
            .await
    }

    async fn count(&self, class: MediaClass) -> Result<u64> {
        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", class.table_name()),
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as u64)
            .map_err(|e| storage_error("count records", e))
        })
        .await
    }
}

fn exists(conn: &Connection, class: MediaClass, page_url: &str) -> Result<bool> {
    conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE page_url = ?1)",
            class.table_name()
        ),
        params![page_url],
        |row| row.get::<_, bool>(0),
    )
    .map_err(|e| storage_error("check existence", e))
}

fn insert(conn: &Connection, class: MediaClass, page_url: &str, blob: &[u8]) -> Result<InsertOutcome> {
    let changed = conn
        .execute(
            &format!(
                "INSERT INTO {} (page_url, feature_vector, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(page_url) DO NOTHING",
                class.table_name()
            ),
            params![page_url, blob, Utc::now().timestamp()],
        )
        .map_err(|e| storage_error("insert vector", e))?;

    if changed == 0 {
        debug!(media_type = %class, page_url, "Record already present");
        Ok(InsertOutcome::AlreadyPresent)
    } else {
        Ok(InsertOutcome::Inserted)
    }
}

fn similar(conn: &Connection, class: MediaClass, query: &[u8], limit: usize) -> Result<Vec<SearchResult>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT page_url, 1.0 - cosine_distance(feature_vector, ?1) AS similarity
             FROM {}
             ORDER BY similarity DESC, page_url ASC
             LIMIT ?2",
            class.table_name()
        ))
        .map_err(|e| storage_error("prepare similarity query", e))?;

    let rows = stmt
        .query_map(params![query, limit as i64], |row| {
            Ok(SearchResult {
                page_url: row.get(0)?,
                similarity: row.get(1)?,
                media_class: class,
            })
        })
        .map_err(|e| storage_error("run similarity query", e))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| storage_error("read similarity results", e))
}

fn by_page_url(conn: &Connection, class: MediaClass, page_url: &str) -> Result<Option<VectorRecord>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT page_url, feature_vector, created_at FROM {} WHERE page_url = ?1",
                class.table_name()
            ),
            params![page_url],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()
        .map_err(|e| storage_error("load record", e))?;

    let Some((page_url, blob, created_secs)) = row else {
        return Ok(None);
    };

    let Some(created_at) = Utc.timestamp_opt(created_secs, 0).single() else {
        return Err(MediaError::StorageUnavailable(format!(
            "Record {} has an invalid created_at ({})",
            page_url, created_secs
        )));
    };

    Ok(Some(VectorRecord {
        page_url,
        media_class: class,
        vector: codec::decode_unchecked(&blob)?,
        created_at,
    }))
}

fn storage_error(action: &str, e: rusqlite::Error) -> MediaError {
    MediaError::StorageUnavailable(format!("Failed to {}: {}", action, e))
}
