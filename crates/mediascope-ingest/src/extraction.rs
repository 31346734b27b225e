//! Feature-extraction collaborator.
//!
//! The extractor turns media (by URL or raw bytes) into feature vectors. It
//! is reached over HTTP/JSON; vectors and uploaded bytes travel hex-encoded,
//! and vectors use the packed little-endian layout from
//! [`mediascope_core::codec`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mediascope_core::codec;
use mediascope_core::config::ExtractorConfig;
use mediascope_core::error::{MediaError, Result};
use mediascope_core::types::{MediaClass, MediaInput};

/// Per-item status reported by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    FailedDownload,
    FailedProcessing,
    FailedUnsupportedType,
    FailedDeserialization,
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionStatus::Success => "success",
            ExtractionStatus::FailedDownload => "failed_download",
            ExtractionStatus::FailedProcessing => "failed_processing",
            ExtractionStatus::FailedUnsupportedType => "failed_unsupported_type",
            ExtractionStatus::FailedDeserialization => "failed_deserialization",
        };
        f.write_str(name)
    }
}

/// One extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureResult {
    /// The media URL or reference id the result belongs to.
    pub url: String,
    pub status: ExtractionStatus,
    #[serde(default)]
    pub error_message: String,
    /// Encoded vector; empty unless `status` is success.
    #[serde(default, with = "hex::serde")]
    pub feature_vector: Vec<u8>,
}

impl FeatureResult {
    pub fn success(url: impl Into<String>, vector: &[f32]) -> Self {
        Self {
            url: url.into(),
            status: ExtractionStatus::Success,
            error_message: String::new(),
            feature_vector: codec::encode(vector),
        }
    }

    pub fn failure(
        url: impl Into<String>,
        status: ExtractionStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            status,
            error_message: message.into(),
            feature_vector: Vec::new(),
        }
    }
}

/// Media the extractor downloads itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlItem {
    pub media_url: String,
    pub media_type: MediaClass,
    pub page_url: String,
}

/// Media uploaded inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesItem {
    #[serde(with = "hex::serde")]
    pub media_bytes: Vec<u8>,
    pub media_type: MediaClass,
    pub reference_id: String,
}

/// Remote feature extraction.
///
/// Results come back in request order, one per item.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    async fn process_urls(
        &self,
        items: Vec<UrlItem>,
        apply_denoising: bool,
    ) -> Result<Vec<FeatureResult>>;

    async fn process_bytes(
        &self,
        items: Vec<BytesItem>,
        apply_denoising: bool,
    ) -> Result<Vec<FeatureResult>>;
}

/// Check a single-item response and decode its vector.
pub fn single_vector(
    results: Vec<FeatureResult>,
    class: MediaClass,
    dimensions: usize,
) -> Result<Vec<f32>> {
    let [result]: [FeatureResult; 1] =
        results
            .try_into()
            .map_err(|rest: Vec<FeatureResult>| MediaError::CountMismatch {
                expected: 1,
                actual: rest.len(),
            })?;

    if result.status != ExtractionStatus::Success {
        return Err(MediaError::RemoteExtractionFailure(format!(
            "{} for {}: {}",
            result.status, result.url, result.error_message
        )));
    }
    if result.feature_vector.is_empty() {
        return Err(MediaError::EmptyResult(format!(
            "extractor returned no {} vector for {}",
            class, result.url
        )));
    }
    codec::decode_with_dimensions(&result.feature_vector, dimensions)
}

/// Extract and validate the vector for one piece of media.
///
/// `reference` is the page URL for URL input and the reference id for
/// uploads.
pub async fn extract_single(
    extractor: &dyn FeatureExtractor,
    input: &MediaInput,
    class: MediaClass,
    reference: &str,
    apply_denoising: bool,
    dimensions: usize,
) -> Result<Vec<f32>> {
    let results = match input {
        MediaInput::Url(url) => {
            let item = UrlItem {
                media_url: url.clone(),
                media_type: class,
                page_url: reference.to_string(),
            };
            extractor.process_urls(vec![item], apply_denoising).await?
        }
        MediaInput::Bytes { data, .. } => {
            let item = BytesItem {
                media_bytes: data.clone(),
                media_type: class,
                reference_id: reference.to_string(),
            };
            extractor.process_bytes(vec![item], apply_denoising).await?
        }
    };
    single_vector(results, class, dimensions)
}

#[derive(Debug, Serialize)]
struct UrlBatchRequest<'a> {
    items: &'a [UrlItem],
    apply_denoising: bool,
}

#[derive(Debug, Serialize)]
struct BytesBatchRequest<'a> {
    items: &'a [BytesItem],
    apply_denoising: bool,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<FeatureResult>,
}

/// HTTP client for the extraction service.
#[derive(Debug, Clone)]
pub struct HttpFeatureExtractor {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFeatureExtractor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                MediaError::Config(format!("Failed to build extractor HTTP client: {}", e))
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Vec<FeatureResult>> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| MediaError::RemoteExtractionFailure(format!("POST {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::RemoteExtractionFailure(format!(
                "POST {} returned {}: {}",
                url, status, body
            )));
        }

        let parsed: BatchResponse = response.json().await.map_err(|e| {
            MediaError::RemoteExtractionFailure(format!("Invalid response from {}: {}", url, e))
        })?;
        debug!(url = %url, results = parsed.results.len(), "Extractor responded");
        Ok(parsed.results)
    }
}

#[async_trait]
impl FeatureExtractor for HttpFeatureExtractor {
    async fn process_urls(
        &self,
        items: Vec<UrlItem>,
        apply_denoising: bool,
    ) -> Result<Vec<FeatureResult>> {
        self.post(
            "/v1/features/urls",
            &UrlBatchRequest {
                items: &items,
                apply_denoising,
            },
        )
        .await
    }

    async fn process_bytes(
        &self,
        items: Vec<BytesItem>,
        apply_denoising: bool,
    ) -> Result<Vec<FeatureResult>> {
        self.post(
            "/v1/features/bytes",
            &BytesBatchRequest {
                items: &items,
                apply_denoising,
            },
        )
        .await
    }
}
