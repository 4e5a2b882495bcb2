//! Unified error handling
//!
//! Every component surfaces the same [`AppError`] enum: the schema validator
//! reports field-level failures, the repositories translate persistence errors
//! at their boundary, and the view registry reports misconfiguration. The HTTP
//! mapping lives here too so a routing layer can bubble errors straight out of
//! a handler with `?`.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use tracing::error;

/// Application error enum
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Input errors (400) ==========
    /// Malformed or ill-typed input, pinned to the offending field
    #[error("Validation failed on '{field}': {reason}")]
    Validation { field: String, reason: String },

    // ========== Business logic errors (4xx) ==========
    /// Entity or association absent (404)
    #[error("{resource} not found: {detail}")]
    NotFound {
        resource: &'static str,
        detail: String,
    },

    /// Uniqueness or duplicate-association violation (409)
    #[error("Resource already exists: {0}")]
    Conflict(String),

    // ========== System errors (5xx) ==========
    /// Unregistered view or other registry misuse (500)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Referential-integrity failure not classified as a conflict (500)
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias used across the crate
pub type AppResult<T> = Result<T, AppError>;

// ========== Helper Constructors ==========

impl AppError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &'static str, detail: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            detail: detail.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// HTTP status this error maps to
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Configuration(_)
            | Self::Constraint(_)
            | Self::Database(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Translate driver errors once, at the repository boundary.
///
/// Driver-level integrity errors carry a kind: unique violations become
/// [`AppError::Conflict`], foreign key violations become
/// [`AppError::Constraint`], everything else is logged and wrapped as
/// [`AppError::Database`].
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    return AppError::Conflict(db_err.message().to_string());
                }
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    return AppError::Constraint(db_err.message().to_string());
                }
                _ => {}
            }
        }
        error!(target: "database", error = %e, "Database error occurred");
        AppError::Database(e.to_string())
    }
}

/// Wire shape of an error response
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = match &self {
            AppError::Validation { .. } => "E0002",
            AppError::NotFound { .. } => "E0003",
            AppError::Conflict(_) => "E0004",
            AppError::Configuration(_) => "E9003",
            AppError::Constraint(_) => "E9004",
            AppError::Database(_) => "E9002",
            AppError::Internal(_) => "E9001",
        };
        let status = self.http_status();
        let body = Json(ErrorBody {
            code,
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}
