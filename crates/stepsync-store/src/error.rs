//! Error types for stepsync-store.

use std::path::PathBuf;

/// Result type for stepsync-store operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while loading and aggregating a step database.
///
/// Every variant is terminal for the load that produced it: the partially
/// built dataset is discarded and the caller keeps (or resets to) an empty one.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// The source path does not exist.
    #[error("Database not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The source exists but SQLite could not open it.
    #[error("Failed to open database {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// The source is missing the expected table or columns.
    #[error("Unexpected database layout: {0}")]
    Schema(String),

    /// Query error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A timestamp could not be mapped onto the civil calendar.
    #[error("Invalid timestamp {value} ms: {reason}")]
    InvalidTimestamp { value: i64, reason: String },

    /// A row carried a negative step count.
    #[error("Invalid step count {value} at timestamp {timestamp_ms} ms")]
    InvalidSteps { value: i64, timestamp_ms: i64 },

    /// A requested calendar position does not exist.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A configured UTC offset is out of range.
    #[error("Invalid UTC offset: {0}")]
    InvalidOffset(String),

    /// A running sum no longer fits in 64 bits.
    #[error("Step total overflowed while aggregating")]
    Overflow,

    /// The background worker died before producing a result.
    #[error("Load worker failed: {0}")]
    Worker(String),
}
