//! Evidence correlation: attaching confirmations to persisted business
//! messages.

use std::sync::Arc;

use tracing::{debug, warn};

use docbridge_core::{Confirmation, ConnectorMessageId, ValidationError};
use docbridge_store::{EvidenceStore, MessageStore};

use crate::error::{Result, TransportError};

/// Service correlating evidence records with business messages.
pub struct EvidenceService<S> {
    store: Arc<S>,
}

impl<S> EvidenceService<S>
where
    S: MessageStore + EvidenceStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist a confirmation against the business message it attests.
    ///
    /// The message must exist; the evidence type's maximum occurrence is
    /// enforced before anything is written. Returns the confirmation with
    /// its assigned id.
    pub async fn persist_evidence_for_message(
        &self,
        message_id: &ConnectorMessageId,
        confirmation: Confirmation,
    ) -> Result<Confirmation> {
        if self.store.find_message(message_id).await?.is_none() {
            warn!(message = %message_id, "evidence for unknown message");
            return Err(TransportError::MessageNotFound(message_id.clone()));
        }

        let evidence_type = confirmation.evidence_type;
        let max = evidence_type.max_occurrence();
        if max > 0 {
            let count = self
                .store
                .count_evidences_of_type(message_id, evidence_type)
                .await?;
            if count >= max {
                return Err(TransportError::DuplicateEvidence { evidence_type, max });
            }
        }

        let id = self.store.persist_evidence(message_id, &confirmation).await?;
        debug!(message = %message_id, evidence = %id, evidence_type = %evidence_type, "persisted evidence");

        let mut confirmation = confirmation;
        confirmation.evidence_id = Some(id);
        Ok(confirmation)
    }

    /// All evidences recorded against a message, oldest first.
    pub async fn find_evidences(
        &self,
        message_id: &ConnectorMessageId,
    ) -> Result<Vec<Confirmation>> {
        Ok(self.store.find_evidences(message_id).await?)
    }

    /// Stamp the moment a confirmation reached the gateway side.
    ///
    /// Requires the confirmation to have been persisted already.
    pub async fn set_delivered_to_gateway(
        &self,
        confirmation: &Confirmation,
        at: i64,
    ) -> Result<()> {
        let id = confirmation
            .evidence_id
            .ok_or(ValidationError::MissingField("evidence_id"))?;
        Ok(self.store.set_evidence_delivered_to_gateway(id, at).await?)
    }

    /// Stamp the moment a confirmation reached the backend side.
    pub async fn set_delivered_to_backend(
        &self,
        confirmation: &Confirmation,
        at: i64,
    ) -> Result<()> {
        let id = confirmation
            .evidence_id
            .ok_or(ValidationError::MissingField("evidence_id"))?;
        Ok(self.store.set_evidence_delivered_to_backend(id, at).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use docbridge_core::{
        EvidenceType, Message, MessageContent, MessageDetails, MessageDirection,
    };
    use docbridge_store::MemoryStore;

    fn message(id: &str) -> Message {
        Message::business_with_id(
            ConnectorMessageId::from(id),
            MessageDetails::new(MessageDirection::BackendToGateway),
            MessageContent::new(Bytes::from_static(b"<x/>")),
        )
    }

    async fn service_with_message(id: &str) -> (EvidenceService<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.persist_message(&message(id)).await.unwrap();
        (EvidenceService::new(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn test_evidence_for_unknown_message_fails() {
        let service = EvidenceService::new(Arc::new(MemoryStore::new()));
        let conf = Confirmation::new(EvidenceType::Delivery, None);
        let err = service
            .persist_evidence_for_message(&ConnectorMessageId::from("ghost"), conf)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::MessageNotFound(_)));
    }

    #[tokio::test]
    async fn test_evidence_gets_id_and_hydrates_message() {
        let (service, store) = service_with_message("id1").await;
        let conf = Confirmation::new(EvidenceType::Delivery, Some(Bytes::from_static(b"<e/>")));

        let persisted = service
            .persist_evidence_for_message(&ConnectorMessageId::from("id1"), conf)
            .await
            .unwrap();
        assert!(persisted.evidence_id.is_some());

        let loaded = store
            .find_message(&ConnectorMessageId::from("id1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.related_confirmations().len(), 1);
    }

    #[tokio::test]
    async fn test_max_occurrence_enforced() {
        let (service, _) = service_with_message("id1").await;
        let id = ConnectorMessageId::from("id1");

        // Delivery allows a single occurrence.
        service
            .persist_evidence_for_message(
                &id,
                Confirmation::new(EvidenceType::Delivery, Some(Bytes::from_static(b"<1/>"))),
            )
            .await
            .unwrap();
        let err = service
            .persist_evidence_for_message(
                &id,
                Confirmation::new(EvidenceType::Delivery, Some(Bytes::from_static(b"<2/>"))),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::DuplicateEvidence {
                evidence_type: EvidenceType::Delivery,
                max: 1
            }
        ));

        // RelayRemmdAcceptance allows two.
        for bytes in [&b"<r1/>"[..], &b"<r2/>"[..]] {
            service
                .persist_evidence_for_message(
                    &id,
                    Confirmation::new(
                        EvidenceType::RelayRemmdAcceptance,
                        Some(Bytes::copy_from_slice(bytes)),
                    ),
                )
                .await
                .unwrap();
        }
        assert!(service
            .persist_evidence_for_message(
                &id,
                Confirmation::new(EvidenceType::RelayRemmdAcceptance, None),
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delivery_stamp_requires_persisted_evidence() {
        let (service, _) = service_with_message("id1").await;
        let unsaved = Confirmation::new(EvidenceType::Delivery, None);
        assert!(matches!(
            service.set_delivered_to_gateway(&unsaved, 100).await,
            Err(TransportError::Validation(ValidationError::MissingField(
                "evidence_id"
            )))
        ));

        let persisted = service
            .persist_evidence_for_message(&ConnectorMessageId::from("id1"), unsaved)
            .await
            .unwrap();
        service.set_delivered_to_gateway(&persisted, 100).await.unwrap();

        let evidences = service
            .find_evidences(&ConnectorMessageId::from("id1"))
            .await
            .unwrap();
        assert_eq!(evidences[0].delivered_to_gateway, Some(100));
    }
}
