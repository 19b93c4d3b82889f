use std::time::Duration;

use thiserror::Error;

/// Rejected user input. Handled as a silent no-op by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message is empty")]
    EmptyMessage,
}

/// Failure of a single model call. Never fatal; the turn ends and the
/// controller returns to idle.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model provider error: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("empty response")]
    EmptyResponse,

    #[error("No response within {0:?}")]
    Timeout(Duration),
}

/// A persisted record that could not be decoded into a `Message`.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid timestamp: {value:?}")]
    InvalidTimestamp { value: String },
}

/// The persistence adapter could not read or write.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] SerializationError),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
