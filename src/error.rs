//! HTTP error translation
//!
//! Handlers return [`ApiError`]; it is the only place failures from the
//! lower layers become status codes and JSON bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analyzer::AnalysisError;
use crate::models::ValidationError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body failed validation (400)
    #[error("{message}: {source}")]
    Validation {
        message: &'static str,
        #[source]
        source: ValidationError,
    },

    /// Request could not be parsed at all (400)
    #[error("{message}: {detail}")]
    BadRequest {
        message: &'static str,
        detail: String,
    },

    /// Referenced entity does not exist (404)
    #[error("{0}")]
    NotFound(&'static str),

    /// Store failure (500)
    #[error("{message}: {source}")]
    Persistence {
        message: &'static str,
        #[source]
        source: StorageError,
    },

    /// Analyzer failure (500)
    #[error("{message}: {source}")]
    Analysis {
        message: &'static str,
        #[source]
        source: AnalysisError,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Persistence { .. } | ApiError::Analysis { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation { message, source } => json!({
                "error": message,
                "details": source.issues,
            }),
            ApiError::BadRequest { message, detail } => json!({
                "error": message,
                "details": detail,
            }),
            ApiError::NotFound(message) => json!({ "error": message }),
            ApiError::Persistence { message, source } => json!({
                "error": message,
                "details": source.to_string(),
            }),
            ApiError::Analysis { message, source } => json!({
                "error": message,
                "details": source.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ApiError::Validation {
            message: "Invalid recording data",
            source: ValidationError::single("title", "missing"),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        assert_eq!(
            ApiError::NotFound("Recording not found").status(),
            StatusCode::NOT_FOUND
        );

        let err = ApiError::Analysis {
            message: "Failed to analyze recording",
            source: AnalysisError::Timeout(5),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("timed out after 5 seconds"));
    }
}
