//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::dispatch::DispatchError;
use crate::domain::DomainError;
use crate::event_store::EventStoreError;
use crate::snapshot::SnapshotError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body. Shape matches the core's documented envelope:
/// `error` is one of the fixed category strings, `message` is a human
/// description, `type` is a class-name hint, and `details` carries
/// whatever structured context the category calls for (e.g. the
/// conflicting field on a 409).
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, category, error_type, details) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "Bad Request", "InvalidRequestError", None),
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "Authentication Error", "InvalidApiKeyError", None),
            AppError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "HTTP Error", "PermissionDeniedError", None),
            AppError::MissingHeader(_) => (StatusCode::BAD_REQUEST, "Bad Request", "MissingHeaderError", None),

            AppError::Domain(domain_err) => {
                use DomainError::*;
                match domain_err {
                    UsernameTooShort | InvalidEmailFormat | PasswordRequired | NoFieldsToUpdate => {
                        (StatusCode::BAD_REQUEST, "Validation Error", "ValidationError", None)
                    }
                    CannotUpdateDeletedUser | UserAlreadyDeleted | PasswordMustBeDifferent => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "Business Rule Violation", "BusinessRuleViolationError", None)
                    }
                    UserAlreadyExists { field, value } => (
                        StatusCode::CONFLICT,
                        "Resource Conflict",
                        "UserAlreadyExistsError",
                        Some(json!({ (field.clone()): value.clone() })),
                    ),
                    UserNotFound(_) => (StatusCode::NOT_FOUND, "Resource Not Found", "UserNotFoundError", None),
                }
            }

            AppError::EventStore(e) if e.is_concurrency_conflict() => {
                (StatusCode::CONFLICT, "Resource Conflict", "ConcurrencyConflictError", None)
            }
            AppError::EventStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Infrastructure Error", "EventStoreError", None),
            AppError::Snapshot(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Infrastructure Error", "SnapshotError", None),
            AppError::Dispatch(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Projection Error", "DispatchError", None),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Infrastructure Error", "DatabaseError", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", "InternalError", None),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Infrastructure Error", "ConfigError", None),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: category.to_string(),
            error_type: error_type.to_string(),
            message: self.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
