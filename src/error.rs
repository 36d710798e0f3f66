/// Unified error types for the workdesk service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the portal
#[derive(Error, Debug)]
pub enum ApiError {
    /// Validation errors (missing or malformed input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Validation failures with field-level detail (e.g. password policy)
    #[error("{message}")]
    ValidationDetailed { message: String, errors: Vec<String> },

    /// Authentication errors (missing/invalid/expired credential)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors (valid principal, insufficient role or scope)
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Row absent or outside the caller's scope; intentionally
    /// indistinguishable to avoid confirming existence
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique-constraint violations (duplicate username, email, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Foreign-key violations on write
    #[error("Referential error: {0}")]
    Referential(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map store errors onto the taxonomy: unique violations become conflicts,
/// foreign-key violations become referential errors, everything else stays
/// a generic database error.
impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return ApiError::Conflict("Resource already exists".to_string());
            }
            if db_err.is_foreign_key_violation() {
                return ApiError::Referential(
                    "Operation violates a referential constraint".to_string(),
                );
            }
        }
        ApiError::Database(e)
    }
}

/// Uniform error envelope: { success: false, message, errors? }
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // The envelope carries the plain message; the Display impl's
        // prefixes are for logs
        let (status, message, errors) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::ValidationDetailed { message, errors } => {
                (StatusCode::BAD_REQUEST, message, Some(errors))
            }
            ApiError::Authentication(message) => (StatusCode::UNAUTHORIZED, message, None),
            ApiError::Authorization(message) => (StatusCode::FORBIDDEN, message, None),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message, None),
            ApiError::Referential(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    // Don't leak details
                    "Internal server error".to_string(),
                    None,
                )
            }
            ApiError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            ApiError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorEnvelope {
            success: false,
            message,
            errors,
        });

        (status, body).into_response()
    }
}

/// Result type alias for portal operations
pub type ApiResult<T> = Result<T, ApiError>;
