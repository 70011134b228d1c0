//! Perception errors.

use loupguard_worker::WorkerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("Frame source error: {0}")]
    Source(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Replay file {path} line {line}: {message}")]
    Replay {
        path: String,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<PerceptionError> for WorkerError {
    fn from(e: PerceptionError) -> Self {
        match e {
            PerceptionError::Io(e) => WorkerError::Io(e),
            other => WorkerError::Custom(other.to_string()),
        }
    }
}
