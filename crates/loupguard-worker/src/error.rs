//! Worker errors.

use loupguard_config::ConfigError;
use loupguard_core::HubError;
use thiserror::Error;

/// Failure of a single `init`, `step` or `teardown` call.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Worker task failed: {0}")]
    Join(String),

    #[error("{0}")]
    Custom(String),
}

impl WorkerError {
    pub fn custom(msg: impl Into<String>) -> Self {
        WorkerError::Custom(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hub_error() {
        let err: WorkerError = HubError::NotAMap("trigger_flag".to_string()).into();
        assert!(matches!(err, WorkerError::Hub(_)));
        assert!(err.to_string().contains("trigger_flag"));
    }

    #[test]
    fn test_custom_display() {
        let err = WorkerError::custom("camera unplugged");
        assert_eq!(err.to_string(), "camera unplugged");
    }

    #[test]
    fn test_transport_display() {
        let err = WorkerError::Transport("port closed".to_string());
        assert!(err.to_string().contains("port closed"));
    }
}
