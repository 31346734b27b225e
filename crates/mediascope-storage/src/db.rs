//! Database connection management.
//!
//! Wraps an r2d2 pool of rusqlite connections. The pool's init hook gives
//! every connection the same PRAGMAs and the `cosine_distance` function;
//! migrations run once when the pool is built.

use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::info;

use mediascope_core::config::StorageConfig;
use mediascope_core::error::{MediaError, Result};
use mediascope_core::types::VectorDimensions;

use crate::{migrations, similarity};

/// Options for opening a file-backed database.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: usize,
    pub busy_timeout: Duration,
    /// Longest wait for a free pooled connection.
    pub pool_timeout: Duration,
    pub dimensions: VectorDimensions,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 8,
            busy_timeout: Duration::from_secs(5),
            pool_timeout: Duration::from_secs(30),
            dimensions: VectorDimensions::default(),
        }
    }
}

impl From<&StorageConfig> for DatabaseOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            pool_timeout: Duration::from_millis(config.pool_timeout_ms.max(1)),
            dimensions: config.dimensions(),
        }
    }
}

/// Pooled SQLite database.
///
/// Connections are handed out one closure at a time through
/// [`Database::with_conn`]. Callers wait up to the pool timeout for a free
/// connection and get [`MediaError::StorageUnavailable`] after that.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    dimensions: VectorDimensions,
    location: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database at `path` and run pending migrations.
    pub fn open(path: &Path, options: &DatabaseOptions) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let busy_timeout = options.busy_timeout;
        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| configure(conn, busy_timeout, true));

        let size = options.max_connections.max(1);
        let pool = Pool::builder()
            .max_size(size as u32)
            .connection_timeout(options.pool_timeout)
            .build(manager)
            .map_err(|e| MediaError::StorageUnavailable(format!("Failed to open database: {}", e)))?;

        let db = Self {
            pool,
            dimensions: options.dimensions,
            location: Some(path.to_path_buf()),
        };
        db.with_conn(|conn| migrations::run_migrations(conn, options.dimensions))?;

        info!(
            path = %path.display(),
            connections = size,
            "Database opened"
        );
        Ok(db)
    }

    /// Open the database described by the storage section of the config.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::open(Path::new(&config.database_path), &DatabaseOptions::from(config))
    }

    /// Open an in-memory database (for testing).
    ///
    /// Every in-memory connection is its own database, so the pool holds a
    /// single connection that is never recycled.
    pub fn in_memory(dimensions: VectorDimensions) -> Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| configure(conn, Duration::from_secs(5), false));
        let pool = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .connection_timeout(Duration::from_secs(30))
            .build(manager)
            .map_err(|e| {
                MediaError::StorageUnavailable(format!("Failed to open in-memory db: {}", e))
            })?;

        let db = Self {
            pool,
            dimensions,
            location: None,
        };
        db.with_conn(|conn| migrations::run_migrations(conn, dimensions))?;
        Ok(db)
    }

    /// Execute a closure with a pooled connection.
    ///
    /// The connection goes back to the pool when the closure returns, even
    /// if it panics.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.pool.get().map_err(|e| {
            MediaError::StorageUnavailable(format!("No database connection available: {}", e))
        })?;
        f(&conn)
    }

    /// Number of connections in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool.max_size() as usize
    }

    /// Dimensionality the vector tables were created with.
    pub fn dimensions(&self) -> VectorDimensions {
        self.dimensions
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .field("pool_size", &self.pool_size())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Connection init hook, run once per pooled connection.
fn configure(conn: &Connection, busy_timeout: Duration, file_backed: bool) -> rusqlite::Result<()> {
    // Set before the PRAGMAs so concurrent first opens wait instead of failing.
    conn.busy_timeout(busy_timeout)?;
    let pragmas = if file_backed {
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;"
    } else {
        "PRAGMA foreign_keys = ON;"
    };
    conn.execute_batch(pragmas)?;
    similarity::register(conn)
}
