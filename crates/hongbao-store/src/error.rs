//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// Every variant is a fault: the store could not answer. Claim races and
/// missing envelopes are reported through `ClaimOutcome`, never here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The backend cannot serve requests (poisoned lock, failed blocking task).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A packet or envelope id is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
