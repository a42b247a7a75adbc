//! Error types for webprompt.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The remote interface could not take the prompt or image.
    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Timed out after {}s waiting for a response", .0.as_secs())]
    Timeout(Duration),

    /// Any other fault while talking to the remote interface.
    #[error("Driver error: {0}")]
    Driver(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// File error tagged with the offending path.
    pub fn file(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::File(format!("{}: {}", path.display(), err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
