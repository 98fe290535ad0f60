//! The connector's aggregate error type.

use docbridge_config::ConfigError;
use docbridge_core::{ConnectorMessageId, LaneId, ValidationError};
use docbridge_store::StoreError;
use docbridge_transport::TransportError;
use thiserror::Error;

/// Errors surfaced by the [`Connector`](crate::Connector) facade.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("lane not found: {0}")]
    LaneNotFound(LaneId),

    #[error("lane {0} has no active configuration set")]
    NoActiveConfiguration(LaneId),

    /// A message referenced an action, service or party the active
    /// configuration set does not know.
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    /// A message reference matched more than one catalog entry.
    #[error("ambiguous reference: {0}")]
    AmbiguousReference(String),

    #[error("a message with id {0} already exists")]
    DuplicateMessage(ConnectorMessageId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;
