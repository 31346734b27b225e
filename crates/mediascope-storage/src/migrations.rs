//! Database schema migrations.
//!
//! Creates one vector table per media class plus the bookkeeping tables
//! `schema_migrations` and `vector_dimensions`. Dimensionality is fixed when
//! the tables are created; reopening with a different configuration is an
//! error rather than a silent schema drift.

use rusqlite::Connection;
use tracing::info;

use mediascope_core::error::{MediaError, Result};
use mediascope_core::types::{MediaClass, VectorDimensions};

/// Run all pending database migrations, then check that the stored
/// dimensionality matches `dimensions`.
pub fn run_migrations(conn: &Connection, dimensions: VectorDimensions) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| MediaError::StorageUnavailable(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            MediaError::StorageUnavailable(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn, dimensions)?;
        info!(
            image_dimensions = dimensions.image,
            audio_dimensions = dimensions.audio,
            "Applied migration v1: vector_tables"
        );
    }

    verify_dimensions(conn, dimensions)
}

/// Version 1: per-class vector tables.
fn apply_v1(conn: &Connection, dimensions: VectorDimensions) -> Result<()> {
    let mut sql = String::from(
        "CREATE TABLE IF NOT EXISTS vector_dimensions (
            media_type  TEXT PRIMARY KEY NOT NULL,
            dimensions  INTEGER NOT NULL
        );\n",
    );

    for class in MediaClass::ALL {
        let table = class.table_name();
        let dims = dimensions.get(class);
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                page_url        TEXT NOT NULL UNIQUE,
                feature_vector  BLOB NOT NULL CHECK (length(feature_vector) = {bytes}),
                created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );
            INSERT OR IGNORE INTO vector_dimensions (media_type, dimensions)
                VALUES ('{name}', {dims});\n",
            table = table,
            bytes = dims * 4,
            name = class.as_str(),
            dims = dims,
        ));
    }

    sql.push_str("INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'vector_tables');");

    conn.execute_batch(&sql)
        .map_err(|e| MediaError::StorageUnavailable(format!("Failed to apply migration v1: {}", e)))
}

fn verify_dimensions(conn: &Connection, dimensions: VectorDimensions) -> Result<()> {
    for class in MediaClass::ALL {
        let stored: i64 = conn
            .query_row(
                "SELECT dimensions FROM vector_dimensions WHERE media_type = ?1",
                [class.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| {
                MediaError::StorageUnavailable(format!(
                    "Failed to read {} dimensions: {}",
                    class, e
                ))
            })?;

        if stored as usize != dimensions.get(class) {
            return Err(MediaError::Config(format!(
                "{} table was created with {} dimensions but {} are configured",
                class,
                stored,
                dimensions.get(class)
            )));
        }
    }
    Ok(())
}
