//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::jobs::JobError;

/// Error detail cap: longer strings may echo model output.
const MAX_DETAIL_LEN: usize = 300;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

fn truncate(detail: &str) -> String {
    let mut result = detail.to_string();
    if result.len() > MAX_DETAIL_LEN {
        result.truncate(MAX_DETAIL_LEN);
        result.push_str("...");
    }
    result
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %truncate(detail), "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(id) => ApiError::NotFound(format!("Job {id} not found")),
            JobError::InvalidTransition { from, to } => {
                ApiError::Conflict(format!("Cannot move job from {from} to {to}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn not_found_returns_404_with_code() {
        let response = ApiError::NotFound("Patient not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Patient not found");
    }

    #[tokio::test]
    async fn internal_hides_details_from_clients() {
        let response =
            ApiError::Internal("sqlite disk I/O error at /data/db".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn invalid_transition_maps_to_conflict() {
        let api_err: ApiError = JobError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Queued,
        }
        .into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn truncate_caps_long_details() {
        let long = "x".repeat(1000);
        assert!(truncate(&long).len() <= MAX_DETAIL_LEN + 3);
        assert_eq!(truncate("short"), "short");
    }
}
