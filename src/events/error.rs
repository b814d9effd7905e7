//! Event model error types
//!
//! Errors raised while constructing windows, weekday sets, or loading events.

use thiserror::Error;

/// Errors that can occur in the event layer
#[derive(Error, Debug)]
pub enum EventError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid time range (start >= end)
    #[error("Invalid time range: start must be less than end")]
    InvalidTimeRange,

    /// Weekday index outside 0 (Sunday) ..= 6 (Saturday)
    #[error("Invalid weekday index: {0} (expected 0-6)")]
    InvalidWeekday(u8),

    /// Date could not be parsed or does not exist in the timezone
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}

/// Result type alias for event operations
pub type EventResult<T> = Result<T, EventError>;
