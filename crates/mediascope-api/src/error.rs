//! API error types and JSON error response formatting.
//!
//! Every error leaves the server as `{"error": <code>, "message": <text>}`.
//! Domain errors use their [`MediaError::kind`] as the code.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use mediascope_core::error::MediaError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - malformed request that never reached the domain layer.
    BadRequest(String),
    /// Status and code derived from the domain error.
    Media(MediaError),
}

/// HTTP status for a domain error.
pub fn status_for(err: &MediaError) -> StatusCode {
    match err {
        MediaError::InvalidInput(_) | MediaError::UnsupportedMediaType(_) => {
            StatusCode::BAD_REQUEST
        }
        MediaError::MalformedVector { .. }
        | MediaError::InvalidVectorValue { .. }
        | MediaError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MediaError::RemoteExtractionFailure(_)
        | MediaError::RemoteScrapeFailure(_)
        | MediaError::EmptyResult(_)
        | MediaError::CountMismatch { .. } => StatusCode::BAD_GATEWAY,
        MediaError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        MediaError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Media(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    error!(kind = err.kind(), error = %err, "Request failed");
                } else {
                    warn!(kind = err.kind(), error = %err, "Request rejected");
                }
                (status, err.kind(), err.to_string())
            }
        };

        let body = ErrorBody {
            error: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        ApiError::Media(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err))
    }
}
