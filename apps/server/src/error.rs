//! API error types and HTTP response mapping.
//!
//! Every handler returns `ApiResult<T>`; the [`IntoResponse`] impl turns
//! errors into JSON `{error, message}` bodies with the matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use flypush_core::ValidationError;
use flypush_db::DbError;
use flypush_render::RenderError;

use crate::pairing::PairingError;

/// API-level errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request failed validation (400).
    #[error("{0}")]
    Validation(String),

    /// Missing or unknown credential (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Entity does not exist for this caller (404).
    #[error("{0}")]
    NotFound(String),

    /// Legal request, illegal state: claim races, ownership, terminal
    /// jobs, settled pairing sessions (409).
    #[error("{0}")]
    Conflict(String),

    /// Pairing session existed but has expired; retryable with a fresh
    /// code (410).
    #[error("Pairing session expired")]
    PairingExpired,

    /// Everything else (500).
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PairingExpired => StatusCode::GONE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::PairingExpired => "pairing_expired",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DbError::AlreadyClaimed { .. }
            | DbError::NotJobOwner { .. }
            | DbError::TerminalState { .. }
            | DbError::InvalidTransition { .. }
            | DbError::UniqueViolation { .. } => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::UnknownFormat(_) | RenderError::MissingField { .. } => {
                ApiError::Validation(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PairingError> for ApiError {
    fn from(err: PairingError) -> Self {
        match err {
            PairingError::UnknownCode | PairingError::UnknownSession => {
                ApiError::NotFound(err.to_string())
            }
            PairingError::Expired => ApiError::PairingExpired,
            PairingError::AlreadySettled | PairingError::Ambiguous => {
                ApiError::Conflict(err.to_string())
            }
            PairingError::NoSessionOpen => ApiError::NotFound(err.to_string()),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_error_mapping() {
        let err: ApiError = DbError::NotFound {
            entity: "print_job".to_string(),
            id: "x".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = DbError::AlreadyClaimed {
            job_id: "x".to_string(),
            status: "claimed".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_pairing_error_mapping() {
        let err: ApiError = PairingError::Expired.into();
        assert_eq!(err.status(), StatusCode::GONE);

        let err: ApiError = PairingError::UnknownCode.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
