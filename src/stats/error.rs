//! Statistics error types
//!
//! Only programmer-error guards surface here. Data-insufficiency conditions
//! are reported in-band on the result records.

use crate::events::EventError;
use thiserror::Error;

/// Errors that can occur while configuring or querying the engine
#[derive(Error, Debug)]
pub enum StatsError {
    /// Invalid bounds, or a glucose value that cannot be classified
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Timezone name not found in the IANA database
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Event layer error
    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

/// Result type for statistics operations
pub type StatsResult<T> = Result<T, StatsError>;
