//! Error types shared by the services and the HTTP layer.
//!
//! [`GitHubError`] describes one failed REST call; callers match on it to tell an
//! expected "not found" or "forbidden" apart from a fault. [`AppError`] is what
//! operations return and what handlers render.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;

/// Outcome of a single GitHub REST call that did not succeed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GitHubError {
    /// 404 from GitHub
    #[error("GitHub resource not found: {0}")]
    NotFound(String),

    /// 403 without rate-limit headers
    #[error("GitHub access forbidden: {0}")]
    Forbidden(String),

    /// 403/429 with an exhausted rate limit
    #[error("GitHub rate limit exceeded (resets at {reset_at:?})")]
    RateLimited { reset_at: Option<i64> },

    /// Any other non-success status
    #[error("GitHub API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Network / TLS / timeout failure
    #[error("GitHub transport error: {0}")]
    Transport(String),

    /// A list endpoint had more pages than the client follows
    #[error("GitHub listing exceeded {pages} pages at {url}")]
    PageLimit { pages: usize, url: String },

    /// Response body did not match the expected shape
    #[error("GitHub response decode error: {0}")]
    Decode(String),

    /// Installation token could not be obtained
    #[error("GitHub authentication failed: {0}")]
    Authentication(String),
}

impl GitHubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Application-level errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or wrong admin key, or a bad webhook signature
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Policy configuration file is missing or empty
    #[error("Compliance configuration not found")]
    ConfigurationNotFound,

    /// Policy configuration could not be parsed or validated
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// GitHub App JWT signing or token exchange failed
    #[error("Authentication failure: {0}")]
    Authentication(String),

    /// GitHub API call failed
    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

impl AppError {
    /// HTTP status and stable machine-readable code for this error.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::ConfigurationNotFound | AppError::InvalidConfiguration(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "CONFIGURATION_ERROR")
            }
            AppError::Authentication(_) => (StatusCode::BAD_GATEWAY, "GITHUB_AUTH_ERROR"),
            AppError::GitHub(_) => (StatusCode::BAD_GATEWAY, "GITHUB_ERROR"),
        }
    }

    /// Message safe to return to callers. Internal details are logged instead.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(detail) => {
                tracing::error!(detail = %detail, "Database error");
                "An internal database error occurred".to_string()
            }
            AppError::Authentication(detail) => {
                tracing::error!(detail = %detail, "GitHub App authentication error");
                "Failed to authenticate with GitHub".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, code) = self.classify();
        HttpResponse::build(status).json(ErrorResponse {
            error: code.to_string(),
            message: self.public_message(),
        })
    }
}

/// JSON body of every error response.
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}
