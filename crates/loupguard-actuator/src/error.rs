//! Actuator errors.

use loupguard_worker::WorkerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Stepper driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ActuatorError> for WorkerError {
    fn from(e: ActuatorError) -> Self {
        WorkerError::Custom(e.to_string())
    }
}
