//! Error types for the transport services.

use docbridge_core::{ConnectorMessageId, EvidenceType, TransportId, ValidationError};
use docbridge_store::StoreError;
use thiserror::Error;

/// Errors from the transport step and evidence services.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Evidence or a step referenced a message that was never persisted.
    #[error("message not found: {0}")]
    MessageNotFound(ConnectorMessageId),

    /// No step exists under the given transport id.
    #[error("transport step not found: {0}")]
    StepNotFound(TransportId),

    /// The message already carries the maximum number of evidences of
    /// this type.
    #[error("evidence type {evidence_type} exceeds its maximum occurrence of {max}")]
    DuplicateEvidence {
        evidence_type: EvidenceType,
        max: u32,
    },

    /// Domain validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
