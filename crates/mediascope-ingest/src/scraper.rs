//! Crawl job submission.
//!
//! The scraper service crawls asynchronously and later delivers what it
//! found through the batch ingestion endpoint. This module only starts jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use mediascope_core::config::ScraperConfig;
use mediascope_core::error::{MediaError, Result};
use mediascope_core::types::{ScrapeRequest, ScrapeResponse, ScrapeStatus};

/// Remote crawler.
#[async_trait]
pub trait ScrapeService: Send + Sync {
    async fn start_scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse>;
}

#[derive(Debug, Serialize)]
struct StartScrapeBody<'a> {
    start_url: &'a str,
    allowed_domains: &'a str,
    depth_limit: i32,
    crawl_strategy: &'a str,
    use_playwright: bool,
}

/// HTTP client for the scraper service.
#[derive(Debug, Clone)]
pub struct HttpScraperClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpScraperClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::Config(format!("Failed to build scraper HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl ScrapeService for HttpScraperClient {
    async fn start_scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse> {
        let url = format!("{}/v1/scrape", self.base_url);
        let body = StartScrapeBody {
            start_url: &request.url,
            allowed_domains: &request.allowed_domains,
            depth_limit: request.depth_limit,
            crawl_strategy: &request.crawl_strategy,
            use_playwright: request.use_playwright,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MediaError::RemoteScrapeFailure(format!("POST {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MediaError::RemoteScrapeFailure(format!(
                "POST {} returned {}: {}",
                url, status, text
            )));
        }

        response.json::<ScrapeResponse>().await.map_err(|e| {
            MediaError::RemoteScrapeFailure(format!("Invalid response from {}: {}", url, e))
        })
    }
}

/// Applies request defaults and forwards crawl jobs.
pub struct ScrapeRequester {
    service: Arc<dyn ScrapeService>,
    default_depth_limit: i32,
    default_crawl_strategy: String,
}

impl ScrapeRequester {
    pub fn new(service: Arc<dyn ScrapeService>, config: &ScraperConfig) -> Self {
        Self {
            service,
            default_depth_limit: config.default_depth_limit,
            default_crawl_strategy: config.default_crawl_strategy.clone(),
        }
    }

    /// Fill in unset fields.
    pub fn with_defaults(&self, mut request: ScrapeRequest) -> ScrapeRequest {
        if request.depth_limit <= 0 {
            request.depth_limit = self.default_depth_limit;
        }
        if request.crawl_strategy.trim().is_empty() {
            request.crawl_strategy = self.default_crawl_strategy.clone();
        }
        request
    }

    /// Start a crawl job. A rejection is returned as `Ok`.
    pub async fn request_scrape(&self, request: ScrapeRequest) -> Result<ScrapeResponse> {
        if request.url.trim().is_empty() {
            return Err(MediaError::InvalidInput("url must not be empty".to_string()));
        }
        let request = self.with_defaults(request);
        let response = self.service.start_scrape(&request).await?;

        match response.status {
            ScrapeStatus::Accepted => info!(
                url = %request.url,
                job_id = %response.job_id,
                depth_limit = request.depth_limit,
                "Scrape job accepted"
            ),
            ScrapeStatus::Rejected => warn!(
                url = %request.url,
                job_id = %response.job_id,
                message = %response.message,
                "Scrape job rejected"
            ),
        }
        Ok(response)
    }
}
