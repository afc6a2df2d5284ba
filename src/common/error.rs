use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::common::responses::ApiResponse;

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Certificate {0} already exists, please update or delete it first")]
    DuplicateKey(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Certificates: {}, do not exist", .0.join(","))]
    UnresolvedKeys(Vec<String>),

    #[error("{0} is not installed")]
    ToolNotAvailable(String),

    #[error("Certificate conversion failed at {step}: {stderr}")]
    ConversionFailed { step: &'static str, stderr: String },

    #[error("Signing with certificate {key} failed: {stderr}")]
    SigningFailed { key: String, stderr: String },

    #[error("{tool} did not finish within {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Sign queue is full, try again later")]
    QueueFull,

    #[error("Sign job {0} has no signed document")]
    JobNotReady(uuid::Uuid),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<openssl::error::ErrorStack> for AppError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        AppError::Crypto(err.to_string())
    }
}

impl AppError {
    /// Map a unique constraint violation on the certificate key to `DuplicateKey`
    pub fn from_insert(err: sqlx::Error, key: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return AppError::DuplicateKey(key.to_string());
            }
        }
        AppError::Database(err)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::UnresolvedKeys(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateKey(_) | AppError::JobNotReady(_) => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ToolNotAvailable(_)
            | AppError::ConversionFailed { .. }
            | AppError::SigningFailed { .. }
            | AppError::ToolTimeout { .. }
            | AppError::Crypto(_)
            | AppError::Io(_)
            | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs
        let message = match &self {
            AppError::Io(_) | AppError::Database(_) | AppError::Crypto(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        ApiResponse::<()>::error(status, message).into_response()
    }
}
