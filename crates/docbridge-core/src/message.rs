//! The message aggregate: the unit of work exchanged between backend and
//! gateway, together with its routing details, content, attachments,
//! confirmations and processing errors.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::evidence::Confirmation;
use crate::payload::LargeFileReference;
use crate::pmode::{Action, Party, Service};
use crate::types::{now_millis, ConnectorMessageId, LaneId};

/// Which way a message travels through the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageDirection {
    BackendToGateway,
    GatewayToBackend,
}

impl MessageDirection {
    pub const fn source(&self) -> &'static str {
        match self {
            MessageDirection::BackendToGateway => "backend",
            MessageDirection::GatewayToBackend => "gateway",
        }
    }

    pub const fn target(&self) -> &'static str {
        match self {
            MessageDirection::BackendToGateway => "gateway",
            MessageDirection::GatewayToBackend => "backend",
        }
    }

    pub fn from_source_target(source: &str, target: &str) -> Option<Self> {
        match (source, target) {
            ("backend", "gateway") => Some(MessageDirection::BackendToGateway),
            ("gateway", "backend") => Some(MessageDirection::GatewayToBackend),
            _ => None,
        }
    }
}

/// Terminal outcome of a message. At most one of these may ever be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalOutcome {
    Confirmed,
    Rejected,
    Failed,
}

/// Routing metadata of a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDetails {
    pub backend_message_id: Option<String>,
    pub ref_to_backend_message_id: Option<String>,
    // AS4 properties
    pub ebms_message_id: Option<String>,
    pub ref_to_message_id: Option<String>,
    pub conversation_id: Option<String>,
    pub original_sender: Option<String>,
    pub final_recipient: Option<String>,
    pub service: Option<Service>,
    pub action: Option<Action>,
    pub from_party: Option<Party>,
    pub to_party: Option<Party>,
    // end of AS4 properties
    /// Backend client the message came from or goes to.
    pub backend_name: Option<String>,
    /// Gateway the message came from or goes to.
    pub gateway_name: Option<String>,
    pub direction: Option<MessageDirection>,
    /// For evidence messages: the business message this one attests.
    pub caused_by: Option<ConnectorMessageId>,
    pub delivered_to_gateway: Option<i64>,
    pub delivered_to_backend: Option<i64>,
    confirmed: Option<i64>,
    rejected: Option<i64>,
    failed: Option<i64>,
}

impl MessageDetails {
    pub fn new(direction: MessageDirection) -> Self {
        Self {
            direction: Some(direction),
            ..Self::default()
        }
    }

    /// Record the terminal outcome of the message.
    ///
    /// The first outcome wins; setting a different outcome later is a
    /// validation error, stamping the same outcome again keeps the
    /// original timestamp.
    pub fn set_terminal(&mut self, outcome: TerminalOutcome, at: i64) -> Result<(), ValidationError> {
        if let Some(existing) = self.terminal_outcome() {
            if existing != outcome {
                return Err(ValidationError::TerminalOutcomeAlreadySet {
                    existing,
                    requested: outcome,
                });
            }
            return Ok(());
        }
        match outcome {
            TerminalOutcome::Confirmed => self.confirmed = Some(at),
            TerminalOutcome::Rejected => self.rejected = Some(at),
            TerminalOutcome::Failed => self.failed = Some(at),
        }
        Ok(())
    }

    pub fn terminal_outcome(&self) -> Option<TerminalOutcome> {
        if self.confirmed.is_some() {
            Some(TerminalOutcome::Confirmed)
        } else if self.rejected.is_some() {
            Some(TerminalOutcome::Rejected)
        } else if self.failed.is_some() {
            Some(TerminalOutcome::Failed)
        } else {
            None
        }
    }

    pub fn confirmed(&self) -> Option<i64> {
        self.confirmed
    }

    pub fn rejected(&self) -> Option<i64> {
        self.rejected
    }

    pub fn failed(&self) -> Option<i64> {
        self.failed
    }
}

/// Mime type of a detached signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetachedSignatureMimeType {
    Binary,
    Xml,
    Pkcs7,
}

/// A signature detached from the document it signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetachedSignature {
    pub detached_signature: Bytes,
    pub detached_signature_name: Option<String>,
    pub mime_type: DetachedSignatureMimeType,
}

/// A printable document carried with the message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDocument {
    pub document: LargeFileReference,
    pub document_name: String,
    pub detached_signature: Option<DetachedSignature>,
}

/// Business content of a message: the XML payload plus an optional
/// printable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    pub xml_content: Bytes,
    pub document: Option<MessageDocument>,
}

impl MessageContent {
    pub fn new(xml_content: Bytes) -> Self {
        Self {
            xml_content,
            document: None,
        }
    }
}

/// A message attachment, referenced by payload handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAttachment {
    pub attachment: LargeFileReference,
    pub identifier: String,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub description: Option<String>,
}

/// One processing failure recorded against a message.
///
/// Errors are append-only: they describe the degraded-but-inspectable
/// history of the message, they never raise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageProcessError {
    pub text: String,
    pub details: Option<String>,
    pub error_source: Option<String>,
    pub occurred: i64,
}

impl MessageProcessError {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            details: None,
            error_source: None,
            occurred: now_millis(),
        }
    }
}

/// The message aggregate.
///
/// A message is either a business message (it has content) or an evidence
/// message (it transports at least one confirmation) — never neither.
/// That invariant is checked by [`Message::validate_for_persist`] at the
/// persistence boundary rather than at construction, mirroring the looser
/// contract of the surrounding pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    lane_id: LaneId,
    connector_message_id: ConnectorMessageId,
    details: MessageDetails,
    content: Option<MessageContent>,
    attachments: Vec<MessageAttachment>,
    /// Confirmations physically carried by this message.
    transported_confirmations: Vec<Confirmation>,
    /// Confirmations about this business message, accumulated over its
    /// life. Rebuilt from the evidence records at the persistence
    /// boundary, so not part of the serialized snapshot.
    #[serde(skip)]
    related_confirmations: Vec<Confirmation>,
    errors: Vec<MessageProcessError>,
}

impl Message {
    /// Create a business message with a generated id in the default lane.
    pub fn business(details: MessageDetails, content: MessageContent) -> Self {
        Self::business_with_id(ConnectorMessageId::generate(), details, content)
    }

    /// Create a business message with an explicit connector message id.
    pub fn business_with_id(
        connector_message_id: ConnectorMessageId,
        details: MessageDetails,
        content: MessageContent,
    ) -> Self {
        Self {
            lane_id: LaneId::default_lane(),
            connector_message_id,
            details,
            content: Some(content),
            attachments: Vec::new(),
            transported_confirmations: Vec::new(),
            related_confirmations: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Create an evidence message with a generated id in the default lane.
    pub fn evidence(details: MessageDetails, confirmation: Confirmation) -> Self {
        Self::evidence_with_id(ConnectorMessageId::generate(), details, confirmation)
    }

    /// Create an evidence message with an explicit connector message id.
    pub fn evidence_with_id(
        connector_message_id: ConnectorMessageId,
        details: MessageDetails,
        confirmation: Confirmation,
    ) -> Self {
        let mut message = Self {
            lane_id: LaneId::default_lane(),
            connector_message_id,
            details,
            content: None,
            attachments: Vec::new(),
            transported_confirmations: Vec::new(),
            related_confirmations: Vec::new(),
            errors: Vec::new(),
        };
        message.add_transported_confirmation(confirmation);
        message
    }

    /// Rehydrate a message from its persisted parts.
    ///
    /// No validation happens here; the persistence layer is trusted to
    /// only hand back what it was given.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        lane_id: LaneId,
        connector_message_id: ConnectorMessageId,
        details: MessageDetails,
        content: Option<MessageContent>,
        attachments: Vec<MessageAttachment>,
        transported_confirmations: Vec<Confirmation>,
        related_confirmations: Vec<Confirmation>,
        errors: Vec<MessageProcessError>,
    ) -> Self {
        Self {
            lane_id,
            connector_message_id,
            details,
            content,
            attachments,
            transported_confirmations,
            related_confirmations,
            errors,
        }
    }

    pub fn lane_id(&self) -> &LaneId {
        &self.lane_id
    }

    pub fn set_lane_id(&mut self, lane_id: LaneId) {
        self.lane_id = lane_id;
    }

    pub fn connector_message_id(&self) -> &ConnectorMessageId {
        &self.connector_message_id
    }

    pub fn details(&self) -> &MessageDetails {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut MessageDetails {
        &mut self.details
    }

    pub fn content(&self) -> Option<&MessageContent> {
        self.content.as_ref()
    }

    pub fn attachments(&self) -> &[MessageAttachment] {
        &self.attachments
    }

    pub fn transported_confirmations(&self) -> &[Confirmation] {
        &self.transported_confirmations
    }

    pub fn related_confirmations(&self) -> &[Confirmation] {
        &self.related_confirmations
    }

    pub fn set_related_confirmations(&mut self, confirmations: Vec<Confirmation>) {
        self.related_confirmations = confirmations;
    }

    pub fn errors(&self) -> &[MessageProcessError] {
        &self.errors
    }

    /// Append an attachment. Always succeeds.
    pub fn add_attachment(&mut self, attachment: MessageAttachment) {
        self.attachments.push(attachment);
    }

    /// Add a confirmation physically carried by this message.
    ///
    /// Returns `false` without appending if byte-identical evidence of the
    /// same type is already present (idempotent submission guard).
    pub fn add_transported_confirmation(&mut self, confirmation: Confirmation) -> bool {
        if self
            .transported_confirmations
            .iter()
            .any(|c| c.same_evidence_content(&confirmation))
        {
            return false;
        }
        self.transported_confirmations.push(confirmation);
        true
    }

    /// Add a confirmation about this business message. Always appends:
    /// related confirmations accumulate as different evidence types arrive.
    pub fn add_related_confirmation(&mut self, confirmation: Confirmation) {
        self.related_confirmations.push(confirmation);
    }

    /// Append a processing error. Prior errors are never removed.
    pub fn add_error(&mut self, error: MessageProcessError) {
        self.errors.push(error);
    }

    /// An evidence message transports confirmations and has no content.
    pub fn is_evidence_message(&self) -> bool {
        self.content.is_none() && !self.transported_confirmations.is_empty()
    }

    /// Check the aggregate invariant before persisting: a message is
    /// either a business message or an evidence message, never neither.
    pub fn validate_for_persist(&self) -> Result<(), ValidationError> {
        if self.content.is_none() && self.transported_confirmations.is_empty() {
            return Err(ValidationError::NoContentNorConfirmation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceType;

    fn details() -> MessageDetails {
        MessageDetails::new(MessageDirection::BackendToGateway)
    }

    fn delivery_evidence(bytes: &'static [u8]) -> Confirmation {
        Confirmation::new(EvidenceType::Delivery, Some(Bytes::from_static(bytes)))
    }

    #[test]
    fn test_business_message_validates() {
        let msg = Message::business(details(), MessageContent::new(Bytes::from_static(b"<x/>")));
        assert!(msg.validate_for_persist().is_ok());
        assert!(!msg.is_evidence_message());
    }

    #[test]
    fn test_evidence_message_without_content_validates() {
        let mut d = details();
        d.caused_by = Some(ConnectorMessageId::from("id1"));
        let msg = Message::evidence_with_id(
            ConnectorMessageId::from("ev1"),
            d,
            delivery_evidence(b"<evidence/>"),
        );
        assert!(msg.validate_for_persist().is_ok());
        assert!(msg.is_evidence_message());
    }

    #[test]
    fn test_message_with_neither_content_nor_confirmation_is_invalid() {
        let msg = Message::from_parts(
            LaneId::default_lane(),
            ConnectorMessageId::generate(),
            details(),
            None,
            vec![],
            vec![],
            vec![],
            vec![],
        );
        assert!(matches!(
            msg.validate_for_persist(),
            Err(ValidationError::NoContentNorConfirmation)
        ));
    }

    #[test]
    fn test_transported_confirmation_dedup_by_content() {
        let mut msg = Message::evidence(details(), delivery_evidence(b"<same/>"));
        assert!(!msg.add_transported_confirmation(delivery_evidence(b"<same/>")));
        assert_eq!(msg.transported_confirmations().len(), 1);

        assert!(msg.add_transported_confirmation(delivery_evidence(b"<other/>")));
        assert_eq!(msg.transported_confirmations().len(), 2);
    }

    #[test]
    fn test_related_confirmations_accumulate_without_dedup() {
        let mut msg = Message::business(details(), MessageContent::new(Bytes::from_static(b"<x/>")));
        msg.add_related_confirmation(delivery_evidence(b"<e/>"));
        msg.add_related_confirmation(delivery_evidence(b"<e/>"));
        assert_eq!(msg.related_confirmations().len(), 2);
    }

    #[test]
    fn test_errors_are_append_only() {
        let mut msg = Message::business(details(), MessageContent::new(Bytes::from_static(b"<x/>")));
        msg.add_error(MessageProcessError::new("first failure"));
        msg.add_error(MessageProcessError::new("second failure"));
        assert_eq!(msg.errors().len(), 2);
        assert_eq!(msg.errors()[0].text, "first failure");
    }

    #[test]
    fn test_terminal_outcome_first_wins() {
        let mut d = details();
        d.set_terminal(TerminalOutcome::Confirmed, 100).unwrap();
        assert_eq!(d.confirmed(), Some(100));

        // Same outcome again keeps the first timestamp.
        d.set_terminal(TerminalOutcome::Confirmed, 200).unwrap();
        assert_eq!(d.confirmed(), Some(100));

        // A different outcome is rejected.
        let err = d.set_terminal(TerminalOutcome::Rejected, 300).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TerminalOutcomeAlreadySet { .. }
        ));
        assert!(d.rejected().is_none());
    }

    #[test]
    fn test_related_confirmations_not_in_snapshot() {
        let mut msg = Message::business(details(), MessageContent::new(Bytes::from_static(b"<x/>")));
        msg.add_related_confirmation(delivery_evidence(b"<e/>"));

        let json = serde_json::to_string(&msg).unwrap();
        let restored: Message = serde_json::from_str(&json).unwrap();
        assert!(restored.related_confirmations().is_empty());
        assert_eq!(restored.connector_message_id(), msg.connector_message_id());
    }
}
