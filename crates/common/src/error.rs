//! Error types for PatternWatch

use thiserror::Error;

/// Result type alias using PatternWatch Error
pub type Result<T> = std::result::Result<T, Error>;

/// PatternWatch error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Resource already exists: {kind} with id {id}")]
    AlreadyExists { kind: String, id: String },

    #[error("Invalid blind region: {0}")]
    InvalidRegion(String),

    #[error("Invalid browser name: {0:?}")]
    InvalidBrowser(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Integrity verification failed: {0}")]
    IntegrityError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn not_found(kind: &str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            id: id.into(),
        }
    }

    pub(crate) fn already_exists(kind: &str, id: impl Into<String>) -> Self {
        Error::AlreadyExists {
            kind: kind.to_string(),
            id: id.into(),
        }
    }
}
