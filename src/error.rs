//! Error types for todo-api
//!
//! Every error is resolved at the request boundary into an HTTP status:
//! - 400: malformed input (bad ID, missing `complete` marker, bad JSON)
//! - 404: ID beyond the list bounds, unknown path
//! - 405: known path, unsupported method
//! - 500: list file could not be read, parsed or written
//! - 503: lock acquisition timed out

use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Exit codes for the todo-api binary
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for todo-api operations
#[derive(Error, Debug)]
pub enum Error {
    // Request errors
    #[error("invalid data, {0}")]
    InvalidData(String),

    #[error("not found, {0}")]
    NotFound(String),

    #[error("method not supported: {0}")]
    MethodNotAllowed(String),

    // Persistence errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Timed out after {0:?} waiting for the list lock")]
    LockTimeout(Duration),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidData(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Io(_)
            | Error::Json(_)
            | Error::Persistence(_)
            | Error::LockFailed(_)
            | Error::InvalidConfig(_)
            | Error::TomlParse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the exit code for this error when it escapes the binary
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_) | Error::TomlParse(_) | Error::InvalidData(_) => {
                exit_codes::USER_ERROR
            }
            _ => exit_codes::OPERATION_FAILED,
        }
    }

    /// True for failures of the list file itself rather than of the request
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Json(_) | Error::Persistence(_) | Error::LockFailed(_)
        )
    }
}

/// Result type alias for todo-api operations
pub type Result<T> = std::result::Result<T, Error>;
