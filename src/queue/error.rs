//! Error types for task queue operations

use crate::error::AppError;

/// Result type for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Errors that can occur while pushing or popping tasks
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Task payload rejected before it is enqueued
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Queue backend failure
    #[error("Queue backend error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for QueueError {
    fn from(err: bincode::Error) -> Self {
        QueueError::SerializationError(err.to_string())
    }
}

impl From<sled::Error> for QueueError {
    fn from(err: sled::Error) -> Self {
        QueueError::Backend(err.to_string())
    }
}

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        QueueError::Backend(err.to_string())
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidTask(msg) => AppError::NotAcceptable(msg),
            QueueError::ConfigurationError(msg) => AppError::Configuration(msg),
            _ => AppError::Storage(err.to_string()),
        }
    }
}
