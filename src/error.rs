//! Error types for Hartrace

use std::io;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::recording::RequestToken;

/// Result type for Hartrace operations
pub type Result<T> = std::result::Result<T, HartraceError>;

/// Errors that can occur in Hartrace
#[derive(Debug, Error)]
pub enum HartraceError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No pending entry matches the correlation key
    #[error("No pending entry for {url} started at {started_at}")]
    CorrelationMiss {
        /// Normalized URL of the response
        url: String,
        /// Start timestamp supplied with the response
        started_at: DateTime<Utc>,
    },

    /// The token does not name a pending entry of the current page
    #[error("Unknown or completed request token {0}")]
    UnknownToken(RequestToken),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request or response body exceeds the configured limit
    #[error("Body exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Size limit
        limit: usize,
    },

    /// Upstream request failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}
