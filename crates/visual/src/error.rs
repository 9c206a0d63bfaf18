//! Error types for comparison runs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisualError {
    #[error(transparent)]
    Common(#[from] patternwatch_common::Error),

    #[error("Screenshot could not be read: {name} - {reason}")]
    ScreenshotUnreadable { name: String, reason: String },

    #[error("Comparison task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Comparison scheduling failed: {0}")]
    Scheduling(#[from] tokio::sync::AcquireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type VisualResult<T> = Result<T, VisualError>;
