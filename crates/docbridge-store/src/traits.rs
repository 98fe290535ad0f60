//! Store traits: the abstract persistence interface of the connector.
//!
//! Each concern gets its own trait so service crates can name exactly the
//! capabilities they use. Implementations include SQLite (primary) and
//! in-memory (for tests).

use async_trait::async_trait;
use bytes::Bytes;
use docbridge_core::{
    BusinessDomain, Confirmation, ConnectorMessageId, EvidenceId, EvidenceType, Keystore, LaneId,
    LargeFileReference, LinkPartnerName, Message, PModeSet, RoutingRule, TransportId,
    TransportState, TransportStep,
};

use crate::error::Result;

/// Lane (business domain) persistence.
#[async_trait]
pub trait LaneStore: Send + Sync {
    async fn find_lane(&self, id: &LaneId) -> Result<Option<BusinessDomain>>;

    async fn find_all_lanes(&self) -> Result<Vec<BusinessDomain>>;

    /// Create a lane. A lane with the same id is a `Duplicate` error.
    async fn create_lane(&self, lane: &BusinessDomain) -> Result<()>;

    /// Update an existing lane. A missing lane is a `NotFound` error,
    /// never an implicit create.
    async fn update_lane(&self, lane: &BusinessDomain) -> Result<()>;
}

/// Message aggregate persistence.
///
/// The aggregate is stored as one JSON snapshot; the related
/// confirmations are excluded from the snapshot and rebuilt from the
/// evidence records on every load.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message. A second message with the same connector
    /// message id is a `Duplicate` error.
    async fn persist_message(&self, message: &Message) -> Result<()>;

    async fn find_message(&self, id: &ConnectorMessageId) -> Result<Option<Message>>;

    async fn find_messages_by_ebms_id(&self, ebms_id: &str) -> Result<Vec<Message>>;

    /// Replace the stored snapshot of an existing message. `NotFound` if
    /// the message was never persisted.
    async fn update_message(&self, message: &Message) -> Result<()>;
}

/// Evidence record persistence.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Persist a confirmation against a business message and return its
    /// assigned id. `NotFound` if the message does not exist.
    async fn persist_evidence(
        &self,
        message_id: &ConnectorMessageId,
        confirmation: &Confirmation,
    ) -> Result<EvidenceId>;

    async fn count_evidences_of_type(
        &self,
        message_id: &ConnectorMessageId,
        evidence_type: EvidenceType,
    ) -> Result<u32>;

    /// All evidences of a message, oldest first, ids assigned.
    async fn find_evidences(&self, message_id: &ConnectorMessageId) -> Result<Vec<Confirmation>>;

    async fn set_evidence_delivered_to_gateway(&self, id: EvidenceId, at: i64) -> Result<()>;

    async fn set_evidence_delivered_to_backend(&self, id: EvidenceId, at: i64) -> Result<()>;
}

/// Transport step persistence.
#[async_trait]
pub trait TransportStepStore: Send + Sync {
    /// Insert a new step. An already taken
    /// (message id, link partner, attempt) is a `Duplicate` error.
    async fn insert_step(&self, step: &TransportStep) -> Result<()>;

    /// Insert or fully replace a step, keyed by
    /// (message id, link partner, attempt).
    async fn save_step(&self, step: &TransportStep) -> Result<()>;

    async fn find_step(&self, transport_id: &TransportId) -> Result<Option<TransportStep>>;

    /// Highest attempt number recorded for the pair, 0 if none.
    async fn highest_attempt(
        &self,
        message_id: &ConnectorMessageId,
        partner: &LinkPartnerName,
    ) -> Result<u32>;

    async fn find_steps_by_message(
        &self,
        message_id: &ConnectorMessageId,
    ) -> Result<Vec<TransportStep>>;

    /// For every (message, partner) pair of the given partners, the step
    /// with the highest attempt, filtered to those whose head status is
    /// one of `states`.
    async fn find_last_attempt_steps_in_states(
        &self,
        states: &[TransportState],
        partners: &[LinkPartnerName],
    ) -> Result<Vec<TransportStep>>;

    /// Distinct link partner names appearing in any step.
    async fn all_link_partner_names(&self) -> Result<Vec<LinkPartnerName>>;
}

/// PMode configuration set persistence.
#[async_trait]
pub trait PModeSetStore: Send + Sync {
    async fn current_active_set(&self, lane_id: &LaneId) -> Result<Option<PModeSet>>;

    /// Previously active sets of a lane, newest first.
    async fn inactive_sets(&self, lane_id: &LaneId) -> Result<Vec<PModeSet>>;

    /// Deactivate the lane's current active set and persist `set` as the
    /// new active one, atomically.
    async fn replace_active_set(&self, set: &PModeSet) -> Result<()>;
}

/// Keystore (trust store) persistence.
#[async_trait]
pub trait KeystoreStore: Send + Sync {
    /// Persist a new keystore. An existing uuid is a `Duplicate` error.
    async fn persist_keystore(&self, keystore: &Keystore) -> Result<()>;

    async fn find_keystore(&self, uuid: &str) -> Result<Option<Keystore>>;

    async fn update_keystore_password(&self, uuid: &str, password: &str) -> Result<()>;
}

/// Routing rule persistence.
#[async_trait]
pub trait RoutingRuleStore: Send + Sync {
    async fn find_routing_rules(&self, lane_id: &LaneId) -> Result<Vec<RoutingRule>>;

    async fn upsert_routing_rule(&self, rule: &RoutingRule) -> Result<()>;

    async fn delete_routing_rule(&self, lane_id: &LaneId, rule_id: &str) -> Result<()>;
}

/// Storage of large payload bytes outside the message snapshot.
///
/// The domain model only ever holds [`LargeFileReference`] handles;
/// resolving them to bytes goes through this seam.
#[async_trait]
pub trait LargeFileStorage: Send + Sync {
    /// Store payload bytes for a message and return the handle.
    async fn create_payload(
        &self,
        message_id: &ConnectorMessageId,
        name: Option<String>,
        mime_type: Option<String>,
        bytes: Bytes,
    ) -> Result<LargeFileReference>;

    async fn read_payload(&self, reference: &LargeFileReference) -> Result<Bytes>;

    async fn delete_payload(&self, reference: &LargeFileReference) -> Result<()>;
}

/// The full persistence surface the connector facade needs.
pub trait ConnectorStore:
    LaneStore
    + MessageStore
    + EvidenceStore
    + TransportStepStore
    + PModeSetStore
    + KeystoreStore
    + RoutingRuleStore
{
}

impl<S> ConnectorStore for S where
    S: LaneStore
        + MessageStore
        + EvidenceStore
        + TransportStepStore
        + PModeSetStore
        + KeystoreStore
        + RoutingRuleStore
{
}
