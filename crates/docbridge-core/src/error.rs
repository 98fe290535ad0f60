//! Error types for the docbridge core domain model.

use thiserror::Error;

use crate::message::TerminalOutcome;
use crate::transport::TransportState;
use crate::types::ConnectorMessageId;

/// Validation errors for the domain model.
///
/// These are always surfaced synchronously to the caller and never
/// retried automatically.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("message must have either content or at least one transported confirmation")]
    NoContentNorConfirmation,

    #[error("required field missing: {0}")]
    MissingField(&'static str),

    #[error(
        "cannot add status update [{state:?}]: a status with priority {head_priority} \
         or higher is already present"
    )]
    PriorityRegression {
        state: TransportState,
        head_priority: i32,
    },

    #[error(
        "cannot set connector message id [{requested}] on a step already carrying \
         message [{existing}]"
    )]
    ConflictingMessageId {
        existing: ConnectorMessageId,
        requested: ConnectorMessageId,
    },

    #[error("the transported message must have a connector message id")]
    MessageIdMissing,

    #[error("link partner name must not be empty")]
    EmptyLinkPartnerName,

    #[error("terminal outcome is already {existing:?}, cannot set {requested:?}")]
    TerminalOutcomeAlreadySet {
        existing: TerminalOutcome,
        requested: TerminalOutcome,
    },

    #[error("connector store uuid must be set when activating the first configuration set")]
    MissingStoreUuid,

    #[error("{0}")]
    Invalid(String),
}
