//! Error types for storage operations

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Version or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Snapshot (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Draft file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding the connection
    #[error("Store connection lock poisoned")]
    Poisoned,
}
