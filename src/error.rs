//! Error types for Ralph
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// All error types that can occur in Ralph
#[derive(Debug, Error)]
pub enum RalphError {
    /// Loop not initialized, or malformed limits
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Command refused in the current loop state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A durable write or read failed
    #[error("Persistence failure at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored file exists but cannot be parsed
    #[error("Corrupt file {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    /// Version-control or other environment operation failed
    #[error("Environment error: {0}")]
    Environment(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RalphError {
    /// Wrap an io::Error with the path it happened on.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RalphError::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for Ralph operations
pub type Result<T> = std::result::Result<T, RalphError>;
