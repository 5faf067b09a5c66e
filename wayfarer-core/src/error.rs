//! Error types for wayfarer-core

use thiserror::Error;

/// Main error type for the wayfarer-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Offline store error
    #[error("store error: {0}")]
    Store(String),

    /// Trip not found in the offline store
    #[error("trip not found: {0}")]
    TripNotFound(String),

    /// HTTP transport failure (connection, DNS, timeout)
    #[error("network error: {0}")]
    Http(String),

    /// Server rejected the payload; lists the offending fields
    #[error("validation failed: {message} (fields: {})", fields.join(", "))]
    Validation { message: String, fields: Vec<String> },

    /// Authentication or permission failure, distinct from NotFound
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Remote resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response from a remote service
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Chat service error
    #[error("chat error: {0}")]
    Chat(String),
}

/// Result type alias for wayfarer-core
pub type Result<T> = std::result::Result<T, Error>;
