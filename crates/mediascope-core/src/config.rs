use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MediaError, Result};
use crate::types::{MediaClass, VectorDimensions};

/// Top-level configuration for Mediascope.
///
/// Loaded from a TOML file. Every section is optional and falls back to its
/// defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediascopeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl MediascopeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MediascopeConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or is invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        for class in MediaClass::ALL {
            if self.storage.dimensions().get(class) == 0 {
                return Err(MediaError::Config(format!(
                    "{} vector dimensions must be positive",
                    class
                )));
            }
        }
        if self.storage.pool_timeout_ms == 0 {
            return Err(MediaError::Config(
                "storage.pool_timeout_ms must be positive".to_string(),
            ));
        }
        if self.storage.max_connections == 0 {
            return Err(MediaError::Config(
                "storage.max_connections must be at least 1".to_string(),
            ));
        }
        if self.search.default_limit == 0 {
            return Err(MediaError::Config(
                "search.default_limit must be positive".to_string(),
            ));
        }
        if self.search.default_limit > self.search.max_limit {
            return Err(MediaError::Config(format!(
                "search.default_limit ({}) exceeds search.max_limit ({})",
                self.search.default_limit, self.search.max_limit
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS (the search front end).
    pub cors_origins: Vec<String>,
    /// Upper bound for uploaded media, in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["http://localhost:3000".to_string()],
            max_upload_mb: 50,
        }
    }
}

/// Vector storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database_path: String,
    /// Size of the connection pool shared by ingestion and search.
    pub max_connections: usize,
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// How long a caller waits for a pooled connection, in milliseconds.
    pub pool_timeout_ms: u64,
    /// Dimensionality of image vectors.
    pub image_dimensions: usize,
    /// Dimensionality of audio vectors.
    pub audio_dimensions: usize,
}

impl StorageConfig {
    pub fn dimensions(&self) -> VectorDimensions {
        VectorDimensions::new(self.image_dimensions, self.audio_dimensions)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dims = VectorDimensions::default();
        Self {
            database_path: "data/mediascope.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5_000,
            pool_timeout_ms: 30_000,
            image_dimensions: dims.image,
            audio_dimensions: dims.audio,
        }
    }
}

/// Feature-extraction service client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Ask the extractor to denoise audio before embedding.
    pub apply_denoising: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:50051".to_string(),
            timeout_secs: 60,
            apply_denoising: false,
        }
    }
}

/// Scraper service client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Depth used when a request asks for zero or a negative depth.
    pub default_depth_limit: i32,
    /// Strategy used when a request leaves it blank.
    pub default_crawl_strategy: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:50052".to_string(),
            timeout_secs: 30,
            default_depth_limit: 2,
            default_crawl_strategy: "default".to_string(),
        }
    }
}

/// Batch ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum items processed at once. 0 derives it from the CPU count.
    pub concurrency_limit: usize,
    /// Deadline for a whole batch, in seconds.
    pub batch_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 0,
            batch_timeout_secs: 300,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of results when the caller gives no positive limit.
    pub default_limit: usize,
    /// Hard cap on the number of results.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}
