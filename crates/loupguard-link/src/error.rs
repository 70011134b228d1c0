//! Link errors.

use loupguard_worker::WorkerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Failed to open link '{target}': {source}")]
    Open {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid link target: {0}")]
    InvalidTarget(String),

    #[error("Link closed by peer")]
    Closed,

    #[error("Link write timed out after {0:?}")]
    WriteTimeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LinkError> for WorkerError {
    fn from(e: LinkError) -> Self {
        WorkerError::Transport(e.to_string())
    }
}
