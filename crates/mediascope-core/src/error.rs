use thiserror::Error;

/// Top-level error type for Mediascope.
///
/// Every failure that can happen while ingesting or searching media maps to
/// exactly one variant. [`MediaError::kind`] gives the stable machine-readable
/// code that the HTTP layer puts on the wire.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MediaError {
    #[error("Malformed vector: byte length {len} is not a multiple of 4")]
    MalformedVector { len: usize },

    #[error("Invalid vector value: NaN or infinity at index {index}")]
    InvalidVectorValue { index: usize },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Feature extraction failed: {0}")]
    RemoteExtractionFailure(String),

    #[error("Scrape request failed: {0}")]
    RemoteScrapeFailure(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Result count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MediaError {
    /// Stable snake_case identifier for this error class.
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::MalformedVector { .. } => "malformed_vector",
            MediaError::InvalidVectorValue { .. } => "invalid_vector_value",
            MediaError::DimensionMismatch { .. } => "dimension_mismatch",
            MediaError::UnsupportedMediaType(_) => "unsupported_media_type",
            MediaError::RemoteExtractionFailure(_) => "remote_extraction_failure",
            MediaError::RemoteScrapeFailure(_) => "remote_scrape_failure",
            MediaError::StorageUnavailable(_) => "storage_unavailable",
            MediaError::EmptyResult(_) => "empty_result",
            MediaError::CountMismatch { .. } => "count_mismatch",
            MediaError::InvalidInput(_) => "invalid_input",
            MediaError::Cancelled(_) => "cancelled",
            MediaError::Config(_) => "config_error",
            MediaError::Io(_) => "io_error",
            MediaError::Serialization(_) => "serialization_error",
        }
    }
}

impl From<toml::de::Error> for MediaError {
    fn from(err: toml::de::Error) -> Self {
        MediaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MediaError {
    fn from(err: toml::ser::Error) -> Self {
        MediaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(err: serde_json::Error) -> Self {
        MediaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Mediascope operations.
pub type Result<T> = std::result::Result<T, MediaError>;
