//! API errors and the failure half of the JSON envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pharmadir_store::StoreError;
use serde::Serialize;

/// Body of every failure response: `{success: false, error, message}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Endpoint not found")]
    RouteNotFound,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Collection already in progress")]
    RunInProgress,
    #[error("{0} pharmacies already stored")]
    DataExists(usize),
    #[error("Collection failed: {error}")]
    RunFailed {
        error: String,
        found: usize,
        duration_seconds: f64,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(detail) => (
                StatusCode::NOT_FOUND,
                "Not found".to_string(),
                detail,
            ),
            ApiError::RouteNotFound => (
                StatusCode::NOT_FOUND,
                "Endpoint not found".to_string(),
                "The requested endpoint does not exist".to_string(),
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "Bad request".to_string(),
                detail,
            ),
            ApiError::RunInProgress => (
                StatusCode::CONFLICT,
                "Collection already in progress".to_string(),
                "A collection run is already in progress".to_string(),
            ),
            ApiError::DataExists(count) => (
                StatusCode::CONFLICT,
                "Existing data".to_string(),
                format!(
                    "There are already {count} pharmacies stored. Use force=true to collect anyway."
                ),
            ),
            ApiError::RunFailed {
                error,
                found,
                duration_seconds,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error,
                format!(
                    "Collection failed after {duration_seconds:.2}s: \
                     {found} pharmacies found, none saved."
                ),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error,
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(format!("Pharmacy {id} not found")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
