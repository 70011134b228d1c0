//! Hub errors.

use thiserror::Error;

/// Errors raised by hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// Field merge attempted on a state entry that is not a map.
    #[error("State key '{0}' is not a map and cannot be updated with fields")]
    NotAMap(String),

    /// Stored resource has a different type than requested.
    #[error("Resource '{key}' is not of type {expected}")]
    ResourceType { key: String, expected: &'static str },

    /// Typed state read or write failed.
    #[error("State key '{key}' could not be converted: {reason}")]
    StateConversion { key: String, reason: String },

    /// Blocking push expired before capacity became available.
    #[error("Queue '{0}' is full")]
    QueueFull(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_map_error() {
        let err = HubError::NotAMap("trigger_flag".to_string());
        let msg = err.to_string();
        assert!(msg.contains("trigger_flag"));
        assert!(msg.contains("not a map"));
    }

    #[test]
    fn test_resource_type_error() {
        let err = HubError::ResourceType {
            key: "lora.tx_queue".to_string(),
            expected: "BoundedQueue",
        };
        let msg = err.to_string();
        assert!(msg.contains("lora.tx_queue"));
        assert!(msg.contains("BoundedQueue"));
    }

    #[test]
    fn test_queue_full_error() {
        let err = HubError::QueueFull("detections".to_string());
        assert_eq!(err.to_string(), "Queue 'detections' is full");
    }
}
