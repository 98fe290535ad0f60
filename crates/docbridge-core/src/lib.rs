//! # Docbridge Core
//!
//! Pure domain model for the docbridge connector: messages, evidences,
//! transport steps, lanes and PMode configuration sets.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the connector's domain objects; persistence and
//! services live in the sibling crates.
//!
//! ## Key Types
//!
//! - [`Message`] - The message aggregate moved between backend and gateway
//! - [`ConnectorMessageId`] - Connector-wide unique message identifier
//! - [`TransportStep`] - One delivery attempt with a priority-gated status history
//! - [`PModeSet`] - A versioned, lane-scoped configuration catalog
//! - [`BusinessDomain`] - An isolated multi-tenant configuration scope (lane)

pub mod error;
pub mod evidence;
pub mod lane;
pub mod link;
pub mod message;
pub mod payload;
pub mod pmode;
pub mod routing;
pub mod transport;
pub mod types;

pub use error::ValidationError;
pub use evidence::{Confirmation, EvidenceType};
pub use lane::{BusinessDomain, ConfigurationSource, DEFAULT_LANE_ID};
pub use link::{LinkConfiguration, LinkMode, LinkPartner, LinkType, DEFAULT_PULL_INTERVAL_SECS};
pub use message::{
    DetachedSignature, DetachedSignatureMimeType, Message, MessageAttachment, MessageContent,
    MessageDetails, MessageDirection, MessageDocument, MessageProcessError, TerminalOutcome,
};
pub use payload::LargeFileReference;
pub use pmode::{Action, Keystore, KeystoreRef, KeystoreType, PModeSet, Party, PartyRoleType, Service};
pub use routing::RoutingRule;
pub use transport::{StatusUpdate, TransportState, TransportStep, FINAL_STATE_PRIORITY};
pub use types::{
    now_millis, ConnectorMessageId, EvidenceId, LaneId, LinkConfigName, LinkPartnerName, TransportId,
};
