//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its request via axum extractors, calls one service
//! from AppState, and returns a JSON response.

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mediascope_core::types::{
    MediaClass, MediaInput, ScrapeRequest, ScrapeResponse, ScrapeStatus, ScrapedItem,
    SearchResult,
};
use mediascope_ingest::media;
use mediascope_ingest::IndexOutcome;
use mediascope_storage::MediaStore;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

/// Body of POST /api/v1/ingest/batch.
#[derive(Debug, Deserialize, Serialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub items: Vec<ScrapedItem>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

/// Body of POST /api/v1/search/url.
#[derive(Debug, Deserialize, Serialize)]
pub struct SearchUrlRequest {
    pub media_url: String,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Body of POST /api/v1/index/url.
#[derive(Debug, Deserialize, Serialize)]
pub struct IndexUrlRequest {
    pub media_url: String,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub items_received: usize,
    pub items_processed: usize,
    pub items_failed: usize,
    pub items_skipped: usize,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexResponse {
    pub message: String,
    pub page_url: String,
    pub media_type: MediaClass,
    pub inserted: bool,
}

impl From<IndexOutcome> for IndexResponse {
    fn from(outcome: IndexOutcome) -> Self {
        let message = if outcome.inserted {
            "Media indexed"
        } else {
            "Media already indexed"
        };
        Self {
            message: message.to_string(),
            page_url: outcome.page_url,
            media_type: outcome.class,
            inserted: outcome.inserted,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub image_count: u64,
    pub audio_count: u64,
}

// =============================================================================
// Multipart upload
// =============================================================================

/// Fields of a media upload form.
#[derive(Debug, Default)]
struct UploadForm {
    filename: String,
    content_type: String,
    data: Option<Vec<u8>>,
    media_type: Option<String>,
    page_url: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "media_file" => {
                    form.filename = field.file_name().unwrap_or_default().to_string();
                    form.content_type = field.content_type().unwrap_or_default().to_string();
                    form.data = Some(field.bytes().await?.to_vec());
                }
                "media_type" => form.media_type = Some(field.text().await?),
                "page_url" => form.page_url = Some(field.text().await?),
                _ => {}
            }
        }
        Ok(form)
    }

    fn class(&self) -> Result<MediaClass, ApiError> {
        Ok(media::resolve_class(
            self.media_type.as_deref(),
            &self.content_type,
            &self.filename,
        )?)
    }

    fn into_input(self) -> Result<MediaInput, ApiError> {
        match self.data {
            Some(data) if !data.is_empty() => Ok(MediaInput::Bytes {
                filename: self.filename,
                data,
            }),
            Some(_) => Err(ApiError::BadRequest("'media_file' is empty".to_string())),
            None => Err(ApiError::BadRequest(
                "Missing 'media_file' field".to_string(),
            )),
        }
    }
}

fn url_class(explicit: Option<&str>, media_url: &str) -> Result<MediaClass, ApiError> {
    if media_url.trim().is_empty() {
        return Err(ApiError::BadRequest("'media_url' must not be empty".to_string()));
    }
    // Without an explicit type the URL path's extension decides.
    let path = media_url.split(['?', '#']).next().unwrap_or_default();
    Ok(media::resolve_class(explicit, "", path)?)
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/v1/ingest/batch - process items delivered by the crawler.
pub async fn ingest_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let job_id = if body.job_id.trim().is_empty() {
        format!("adhoc-{}", Uuid::new_v4())
    } else {
        body.job_id
    };

    let outcome = state.pipeline.process_batch(&job_id, body.items).await?;

    Ok(Json(BatchResponse {
        items_received: outcome.items_received,
        items_processed: outcome.items_processed,
        items_failed: outcome.items_failed,
        items_skipped: outcome.items_skipped,
        message: format!(
            "Batch {} processed: {} stored, {} skipped, {} failed",
            job_id, outcome.items_processed, outcome.items_skipped, outcome.items_failed
        ),
    }))
}

/// POST /api/v1/search - search by uploaded media.
pub async fn search_upload(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
    multipart: Multipart,
) -> Result<Json<SearchResponse>, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let class = form.class()?;
    let input = form.into_input()?;

    let results = state.search.search(&input, class, params.limit).await?;
    let count = results.len();
    Ok(Json(SearchResponse { results, count }))
}

/// POST /api/v1/search/url - search by media the extractor downloads.
pub async fn search_url(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
    Json(body): Json<SearchUrlRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let class = url_class(body.media_type.as_deref(), &body.media_url)?;
    let limit = body.limit.or(params.limit);

    let results = state
        .search
        .search(&MediaInput::Url(body.media_url), class, limit)
        .await?;
    let count = results.len();
    Ok(Json(SearchResponse { results, count }))
}

/// POST /api/v1/index - index one uploaded file.
pub async fn index_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IndexResponse>, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let class = form.class()?;
    let page_url = form.page_url.clone();
    let input = form.into_input()?;

    let outcome = state
        .indexer
        .index_media(&input, class, page_url.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /api/v1/index/url - index one piece of media by URL.
pub async fn index_url(
    State(state): State<AppState>,
    Json(body): Json<IndexUrlRequest>,
) -> Result<Json<IndexResponse>, ApiError> {
    let class = url_class(body.media_type.as_deref(), &body.media_url)?;

    let outcome = state
        .indexer
        .index_media(&MediaInput::Url(body.media_url), class, body.page_url.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /api/v1/scrape - start a crawl job.
///
/// 202 when the scraper accepts the job, 200 with `status: rejected` when
/// it declines.
pub async fn scrape(
    State(state): State<AppState>,
    Json(body): Json<ScrapeRequest>,
) -> Result<(StatusCode, Json<ScrapeResponse>), ApiError> {
    let response = state.scraper.request_scrape(body).await?;
    let status = match response.status {
        ScrapeStatus::Accepted => StatusCode::ACCEPTED,
        ScrapeStatus::Rejected => StatusCode::OK,
    };
    Ok((status, Json(response)))
}

/// GET /health - health check with record counts.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let image_count = state.store.count(MediaClass::Image).await?;
    let audio_count = state.store.count(MediaClass::Audio).await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        image_count,
        audio_count,
    }))
}
