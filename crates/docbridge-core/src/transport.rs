//! Transport steps: one delivery attempt of one message to one link
//! partner, with a priority-gated status history.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::message::Message;
use crate::types::{now_millis, ConnectorMessageId, LinkPartnerName, TransportId};

/// Statuses with this priority or higher are terminal for a step.
pub const FINAL_STATE_PRIORITY: i32 = 10;

/// Status of a transport step.
///
/// Each state carries a priority; a step only ever moves to a status of
/// strictly higher priority than its current head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportState {
    /// Queued for transmission over the link.
    Pending,
    /// Fetched by a pull-mode partner but not yet acknowledged.
    PendingDownloaded,
    /// Accepted by the remote end, awaiting final outcome.
    Accepted,
    /// Transmission failed. Terminal.
    Failed,
    /// Delivered to the remote end. Terminal.
    Delivered,
}

/// Static metadata table: variant -> (db name, priority).
const TRANSPORT_STATE_TABLE: &[(TransportState, &str, i32)] = &[
    (TransportState::Pending, "pending", 1),
    (TransportState::PendingDownloaded, "pending_downloaded", 2),
    (TransportState::Accepted, "accepted", 5),
    (TransportState::Failed, "failed", 10),
    (TransportState::Delivered, "delivered", 12),
];

impl TransportState {
    pub fn db_name(&self) -> &'static str {
        TRANSPORT_STATE_TABLE
            .iter()
            .find(|(s, _, _)| s == self)
            .map(|(_, name, _)| *name)
            .expect("every variant is in the table")
    }

    pub fn from_db_name(name: &str) -> Option<Self> {
        TRANSPORT_STATE_TABLE
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(s, _, _)| *s)
    }

    pub fn priority(&self) -> i32 {
        TRANSPORT_STATE_TABLE
            .iter()
            .find(|(s, _, _)| s == self)
            .map(|(_, _, p)| *p)
            .expect("every variant is in the table")
    }

    /// A terminal state ends the step; no further status is accepted
    /// except one of even higher priority.
    pub fn is_final(&self) -> bool {
        self.priority() >= FINAL_STATE_PRIORITY
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.db_name())
    }
}

/// One entry in a step's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub transport_state: TransportState,
    pub created: i64,
    pub text: Option<String>,
}

/// One attempt to deliver one message over one link partner.
///
/// The status history is kept sorted newest-first (ties broken by lower
/// priority first), so the head of the history is always the current
/// status of the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportStep {
    transport_id: TransportId,
    connector_message_id: ConnectorMessageId,
    link_partner_name: LinkPartnerName,
    attempt: u32,
    transported_message: Option<Message>,
    /// Message id assigned by the remote end on acceptance.
    pub remote_message_id: Option<String>,
    /// Id assigned by the local transport system (queue id etc).
    pub transport_system_message_id: Option<String>,
    created: i64,
    final_state_reached: Option<i64>,
    status_updates: Vec<StatusUpdate>,
}

impl TransportStep {
    /// Create a fresh step for the given attempt.
    ///
    /// The transport id is derived from the coordinates and never changes.
    pub fn new(
        connector_message_id: ConnectorMessageId,
        link_partner_name: LinkPartnerName,
        attempt: u32,
    ) -> Result<Self, ValidationError> {
        if link_partner_name.is_empty() {
            return Err(ValidationError::EmptyLinkPartnerName);
        }
        if connector_message_id.as_str().is_empty() {
            return Err(ValidationError::MessageIdMissing);
        }
        let transport_id = TransportId::derive(&connector_message_id, &link_partner_name, attempt);
        Ok(Self {
            transport_id,
            connector_message_id,
            link_partner_name,
            attempt,
            transported_message: None,
            remote_message_id: None,
            transport_system_message_id: None,
            created: now_millis(),
            final_state_reached: None,
            status_updates: Vec::new(),
        })
    }

    /// Rehydrate a step from its persisted parts. The history is re-sorted
    /// so the head invariant holds regardless of storage order.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        transport_id: TransportId,
        connector_message_id: ConnectorMessageId,
        link_partner_name: LinkPartnerName,
        attempt: u32,
        transported_message: Option<Message>,
        created: i64,
        final_state_reached: Option<i64>,
        mut status_updates: Vec<StatusUpdate>,
    ) -> Self {
        sort_history(&mut status_updates);
        Self {
            transport_id,
            connector_message_id,
            link_partner_name,
            attempt,
            transported_message,
            remote_message_id: None,
            transport_system_message_id: None,
            created,
            final_state_reached,
            status_updates,
        }
    }

    pub fn transport_id(&self) -> &TransportId {
        &self.transport_id
    }

    pub fn connector_message_id(&self) -> &ConnectorMessageId {
        &self.connector_message_id
    }

    pub fn link_partner_name(&self) -> &LinkPartnerName {
        &self.link_partner_name
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn created(&self) -> i64 {
        self.created
    }

    pub fn final_state_reached(&self) -> Option<i64> {
        self.final_state_reached
    }

    pub fn transported_message(&self) -> Option<&Message> {
        self.transported_message.as_ref()
    }

    pub fn status_updates(&self) -> &[StatusUpdate] {
        &self.status_updates
    }

    /// Attach the message snapshot being transported by this step.
    ///
    /// The snapshot's id must match the step's message id.
    pub fn set_transported_message(&mut self, message: Message) -> Result<(), ValidationError> {
        if message.connector_message_id().as_str().is_empty() {
            return Err(ValidationError::MessageIdMissing);
        }
        if message.connector_message_id() != &self.connector_message_id {
            return Err(ValidationError::ConflictingMessageId {
                existing: self.connector_message_id.clone(),
                requested: message.connector_message_id().clone(),
            });
        }
        self.transported_message = Some(message);
        Ok(())
    }

    /// The current status of the step, if any status was ever recorded.
    pub fn head(&self) -> Option<&StatusUpdate> {
        self.status_updates.first()
    }

    pub fn is_in_state(&self, state: TransportState) -> bool {
        self.head().map(|u| u.transport_state == state).unwrap_or(false)
    }

    pub fn is_in_pending_state(&self) -> bool {
        self.is_in_state(TransportState::Pending)
    }

    pub fn is_in_pending_downloaded_state(&self) -> bool {
        self.is_in_state(TransportState::PendingDownloaded)
    }

    pub fn is_in_accepted_state(&self) -> bool {
        self.is_in_state(TransportState::Accepted)
    }

    /// Record a status update at the current time.
    ///
    /// Only a status of strictly higher priority than the current head is
    /// accepted; anything else is a priority regression and rejected.
    /// Reaching a terminal state stamps `final_state_reached` once.
    ///
    /// The timestamp is bumped past the head if needed, so an accepted
    /// update always becomes the new head even when the clock has not
    /// advanced a full millisecond since the previous one.
    pub fn add_transport_status(
        &mut self,
        state: TransportState,
        text: Option<String>,
    ) -> Result<(), ValidationError> {
        let mut created = now_millis();
        if let Some(head) = self.head() {
            created = created.max(head.created + 1);
        }
        self.add_transport_status_at(state, created, text)
    }

    /// Like [`add_transport_status`](Self::add_transport_status) with an
    /// explicit timestamp.
    pub fn add_transport_status_at(
        &mut self,
        state: TransportState,
        created: i64,
        text: Option<String>,
    ) -> Result<(), ValidationError> {
        if let Some(head) = self.head() {
            let head_priority = head.transport_state.priority();
            if state.priority() <= head_priority {
                return Err(ValidationError::PriorityRegression {
                    state,
                    head_priority,
                });
            }
        }
        self.status_updates.push(StatusUpdate {
            transport_state: state,
            created,
            text,
        });
        sort_history(&mut self.status_updates);
        if state.is_final() && self.final_state_reached.is_none() {
            self.final_state_reached = Some(created);
        }
        Ok(())
    }
}

/// Newest first; among equal timestamps, lower priority first.
fn sort_history(updates: &mut [StatusUpdate]) {
    updates.sort_by(|a, b| {
        b.created
            .cmp(&a.created)
            .then_with(|| a.transport_state.priority().cmp(&b.transport_state.priority()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> TransportStep {
        TransportStep::new(
            ConnectorMessageId::from("msg1"),
            LinkPartnerName::from("gw"),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_transport_id_derived_from_coordinates() {
        let s = step();
        assert_eq!(s.transport_id().as_str(), "msg1_gw_1");
    }

    #[test]
    fn test_empty_link_partner_rejected() {
        let err = TransportStep::new(
            ConnectorMessageId::from("msg1"),
            LinkPartnerName::from(""),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::EmptyLinkPartnerName));
    }

    #[test]
    fn test_status_priority_gate() {
        let mut s = step();
        s.add_transport_status(TransportState::Pending, None).unwrap();
        s.add_transport_status(TransportState::Accepted, None).unwrap();

        // Equal or lower priority is a regression.
        let err = s
            .add_transport_status(TransportState::Accepted, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::PriorityRegression { head_priority: 5, .. }
        ));
        let err = s
            .add_transport_status(TransportState::Pending, None)
            .unwrap_err();
        assert!(matches!(err, ValidationError::PriorityRegression { .. }));

        assert!(s.is_in_state(TransportState::Accepted));
        assert_eq!(s.status_updates().len(), 2);
    }

    #[test]
    fn test_final_state_stamped_once() {
        let mut s = step();
        s.add_transport_status_at(TransportState::Pending, 10, None)
            .unwrap();
        assert!(s.final_state_reached().is_none());

        s.add_transport_status_at(TransportState::Failed, 20, None)
            .unwrap();
        assert_eq!(s.final_state_reached(), Some(20));

        // Delivered outranks Failed, but the stamp is not moved.
        s.add_transport_status_at(TransportState::Delivered, 30, None)
            .unwrap();
        assert_eq!(s.final_state_reached(), Some(20));
    }

    #[test]
    fn test_rejected_final_state_leaves_no_stamp() {
        let mut s = step();
        s.add_transport_status_at(TransportState::Delivered, 10, None)
            .unwrap();
        assert!(s
            .add_transport_status_at(TransportState::Failed, 20, None)
            .is_err());
        assert_eq!(s.final_state_reached(), Some(10));
    }

    #[test]
    fn test_rapid_updates_always_advance_head() {
        // Seed a head far in the future so the wall clock cannot outrun it;
        // the next update must still land strictly after it.
        let mut s = step();
        let t = now_millis() + 60_000;
        s.add_transport_status_at(TransportState::Pending, t, None)
            .unwrap();

        s.add_transport_status(TransportState::Accepted, None).unwrap();
        assert!(s.is_in_accepted_state());
        assert_eq!(s.head().unwrap().created, t + 1);

        s.add_transport_status(TransportState::Delivered, None).unwrap();
        assert!(s.is_in_state(TransportState::Delivered));
        assert_eq!(s.head().unwrap().created, t + 2);
    }

    #[test]
    fn test_head_is_newest_then_lowest_priority() {
        let updates = vec![
            StatusUpdate {
                transport_state: TransportState::Accepted,
                created: 100,
                text: None,
            },
            StatusUpdate {
                transport_state: TransportState::Pending,
                created: 100,
                text: None,
            },
            StatusUpdate {
                transport_state: TransportState::PendingDownloaded,
                created: 50,
                text: None,
            },
        ];
        let s = TransportStep::from_parts(
            TransportId::from("msg1_gw_1"),
            ConnectorMessageId::from("msg1"),
            LinkPartnerName::from("gw"),
            1,
            None,
            0,
            None,
            updates,
        );
        // Newest wins; among equal timestamps, the lower priority leads.
        let head = s.head().unwrap();
        assert_eq!(head.transport_state, TransportState::Pending);
        assert_eq!(head.created, 100);
    }

    #[test]
    fn test_transported_message_id_must_match() {
        use crate::message::{Message, MessageContent, MessageDetails, MessageDirection};
        use bytes::Bytes;

        let mut s = step();
        let other = Message::business_with_id(
            ConnectorMessageId::from("other"),
            MessageDetails::new(MessageDirection::BackendToGateway),
            MessageContent::new(Bytes::from_static(b"<x/>")),
        );
        assert!(matches!(
            s.set_transported_message(other),
            Err(ValidationError::ConflictingMessageId { .. })
        ));

        let matching = Message::business_with_id(
            ConnectorMessageId::from("msg1"),
            MessageDetails::new(MessageDirection::BackendToGateway),
            MessageContent::new(Bytes::from_static(b"<x/>")),
        );
        s.set_transported_message(matching).unwrap();
        assert!(s.transported_message().is_some());
    }

    #[test]
    fn test_state_db_name_roundtrip() {
        for (state, name, _) in TRANSPORT_STATE_TABLE {
            assert_eq!(TransportState::from_db_name(name), Some(*state));
        }
        assert_eq!(TransportState::from_db_name("nope"), None);
    }
}
