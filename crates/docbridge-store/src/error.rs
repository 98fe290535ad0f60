//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization or deserialization of a stored object failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An entity with the same key already exists.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("store connection poisoned")]
    Poisoned,

    /// A blocking store task could not be joined.
    #[error("store task failed: {0}")]
    Background(String),

    /// I/O error (filesystem payload storage).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
