//! # Gateway Errors
//!
//! HTTP facing errors and the startup errors that end the process.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub use docgate_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::response::{ErrorBody, InternalErrorBody};

/// Result type for request handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Path identifier is not a 24 character hex string
    #[error("Invalid document ID format")]
    InvalidId,

    /// Bulk body is not an array of objects
    #[error("Request body must be an array of documents")]
    ExpectedArray,

    /// A body or body part that must be an object is something else
    #[error("{0} must be a JSON object")]
    ExpectedObject(&'static str),

    /// An extended JSON wrapper such as `{"$oid": ...}` holds a malformed value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Sort specification could not be understood
    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    /// skip or limit in query options is not a number
    #[error("Invalid query option: {0}")]
    InvalidOption(String),

    /// No document has the requested identity
    #[error("Document not found")]
    NotFound,

    /// No route matches the method and path
    #[error("Route not found")]
    RouteNotFound,

    // ==================
    // Server Errors (5xx)
    // ==================
    /// The store reported a failure
    #[error("{0}")]
    Store(#[from] DocumentStoreError),

    /// The body could not be read or decoded, including bodies over the size ceiling
    #[error("{0}")]
    BodyParse(String),

    /// The store did not answer within the configured deadline
    #[error("Database operation timed out")]
    Timeout,
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidId
            | ApiError::ExpectedArray
            | ApiError::ExpectedObject(_)
            | ApiError::InvalidValue(_)
            | ApiError::InvalidSort(_)
            | ApiError::InvalidOption(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::BodyParse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ApiError::BodyParse(message) => (status, Json(InternalErrorBody::new(message))).into_response(),
            other => (status, Json(ErrorBody::new(other.to_string()))).into_response(),
        }
    }
}

/// Errors that stop the process before or while serving
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("MONGODB_URI environment variable is not defined")]
    MissingConnectionString,

    #[error("Invalid log filter: {0}")]
    LogFilter(String),

    #[error("Logging initialization failed: {0}")]
    LogInit(String),

    #[error("{0} requires the `mongodb` feature")]
    BackendUnavailable(String),

    #[error("Failed to connect to the database: {0}")]
    Connect(#[from] DocumentStoreError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
