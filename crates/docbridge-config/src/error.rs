//! Error types for the configuration services.

use docbridge_core::ValidationError;
use docbridge_store::StoreError;
use thiserror::Error;

/// Errors from the lane registry and PMode lifecycle services.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Domain validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
