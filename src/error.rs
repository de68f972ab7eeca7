// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Crate-wide result alias.
pub type AppResult<T> = Result<T, AppError>;

/// Reasons a request fails authentication or authorization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header is required")]
    MissingToken,

    /// Bad signature, malformed claims or an expired token.
    #[error("invalid token")]
    InvalidToken,

    /// The server-side session is gone or belongs to a newer login.
    #[error("session not found or superseded")]
    SessionInvalidated,

    #[error("admin access required")]
    AdminRequired,

    #[error("invalid username or password")]
    InvalidCredentials,
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or malformed input (400).
    #[error("validation error: {0}")]
    Validation(String),

    /// Quiz, artifact or row absent (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// 401, or 403 for `AdminRequired`.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Unique constraint hit, e.g. a taken username (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Broker, session store or wide-column I/O failure. Retryable (503).
    #[error("store unavailable: {0}")]
    TransientStore(String),

    /// Some but not all writes of an export/revoke landed. No rollback is
    /// attempted; `completed` lists what was written before `cause` hit.
    #[error("partial failure after {} write(s): {cause}", .completed.len())]
    PartialFailure { completed: Vec<String>, cause: String },

    #[error("no data to insert")]
    NoData,

    #[error("no updates specified")]
    NoUpdates,

    #[error("no conditions specified for delete")]
    NoConditions,

    // 500 Internal Server Error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Prefixes the error with the operation that produced it, keeping the variant.
    pub fn context(self, operation: &str) -> Self {
        match self {
            AppError::Validation(msg) => AppError::Validation(format!("{operation}: {msg}")),
            AppError::NotFound(msg) => AppError::NotFound(format!("{operation}: {msg}")),
            AppError::TransientStore(msg) => {
                AppError::TransientStore(format!("{operation}: {msg}"))
            }
            AppError::Internal(msg) => AppError::Internal(format!("{operation}: {msg}")),
            AppError::PartialFailure { completed, cause } => AppError::PartialFailure {
                completed,
                cause: format!("{operation}: {cause}"),
            },
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::NoData
            | AppError::NoUpdates
            | AppError::NoConditions => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Auth(AuthError::AdminRequired) => StatusCode::FORBIDDEN,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PartialFailure { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a `{status, message}` JSON body.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::PartialFailure { completed, cause } => {
                tracing::error!(?completed, "Partial failure: {}", cause);
                format!("operation partially applied, reconciliation needed: {cause}")
            }
            AppError::TransientStore(msg) => {
                tracing::warn!("Store unavailable: {}", msg);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "status": status.as_u16(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` so `?` works on relational queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                AppError::TransientStore(err.to_string())
            }
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::Auth(AuthError::InvalidToken)
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::TransientStore(format!("store call timed out: {err}"))
    }
}
