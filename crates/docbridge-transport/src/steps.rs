//! Transport step service: attempt assignment and the persisted status
//! machine.

use std::sync::Arc;

use tracing::{debug, info};

use docbridge_core::{
    ConnectorMessageId, LinkPartnerName, Message, TransportId, TransportState, TransportStep,
};
use docbridge_store::{StoreError, TransportStepStore};

use crate::error::{Result, TransportError};

/// Service managing transport steps.
pub struct TransportStepService<S: TransportStepStore> {
    store: Arc<S>,
}

impl<S: TransportStepStore> TransportStepService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Open a new delivery attempt of `message` towards `partner`.
    ///
    /// The attempt number continues the existing sequence for the
    /// (message, partner) pair; the transport id is derived from it. The
    /// step is persisted without any status yet.
    ///
    /// The save is insert-only: when a competing writer takes the attempt
    /// number between the read and the insert, the next number is tried
    /// instead of overwriting the existing step.
    pub async fn create_step(
        &self,
        message: &Message,
        partner: LinkPartnerName,
    ) -> Result<TransportStep> {
        let message_id = message.connector_message_id().clone();
        let mut attempt = self.store.highest_attempt(&message_id, &partner).await? + 1;

        loop {
            let mut step = TransportStep::new(message_id.clone(), partner.clone(), attempt)?;
            step.set_transported_message(message.clone())?;
            match self.store.insert_step(&step).await {
                Ok(()) => {
                    info!(transport_id = %step.transport_id(), attempt, "created transport step");
                    return Ok(step);
                }
                Err(StoreError::Duplicate(_)) => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Persist the current state of a step.
    pub async fn update(&self, step: &TransportStep) -> Result<()> {
        Ok(self.store.save_step(step).await?)
    }

    pub async fn find_step(&self, transport_id: &TransportId) -> Result<TransportStep> {
        self.store
            .find_step(transport_id)
            .await?
            .ok_or_else(|| TransportError::StepNotFound(transport_id.clone()))
    }

    /// Fold a status update into a persisted step.
    ///
    /// A priority regression is rejected and the stored step stays
    /// unchanged.
    pub async fn record_status(
        &self,
        transport_id: &TransportId,
        state: TransportState,
        text: Option<String>,
    ) -> Result<TransportStep> {
        let mut step = self.find_step(transport_id).await?;
        step.add_transport_status(state, text)?;
        self.store.save_step(&step).await?;
        debug!(transport_id = %transport_id, state = %state, "recorded transport status");
        Ok(step)
    }

    /// Last-attempt steps towards `partner` whose current status is
    /// Pending.
    pub async fn find_pending_steps_by(
        &self,
        partner: &LinkPartnerName,
    ) -> Result<Vec<TransportStep>> {
        Ok(self
            .store
            .find_last_attempt_steps_in_states(
                &[TransportState::Pending],
                std::slice::from_ref(partner),
            )
            .await?)
    }

    pub async fn find_steps_by_message(
        &self,
        message_id: &ConnectorMessageId,
    ) -> Result<Vec<TransportStep>> {
        Ok(self.store.find_steps_by_message(message_id).await?)
    }

    /// All link partners any step was ever opened towards.
    pub async fn find_all_link_partners(&self) -> Result<Vec<LinkPartnerName>> {
        Ok(self.store.all_link_partner_names().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use docbridge_core::{MessageContent, MessageDetails, MessageDirection, ValidationError};
    use docbridge_store::MemoryStore;

    fn message(id: &str) -> Message {
        Message::business_with_id(
            ConnectorMessageId::from(id),
            MessageDetails::new(MessageDirection::BackendToGateway),
            MessageContent::new(Bytes::from_static(b"<x/>")),
        )
    }

    fn service() -> TransportStepService<MemoryStore> {
        TransportStepService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_attempts_are_sequential_per_partner() {
        let service = service();
        let msg = message("id002");
        let partner = LinkPartnerName::from("link2");

        let first = service.create_step(&msg, partner.clone()).await.unwrap();
        assert_eq!(first.attempt(), 1);
        assert_eq!(first.transport_id().as_str(), "id002_link2_1");

        let second = service.create_step(&msg, partner).await.unwrap();
        assert_eq!(second.attempt(), 2);

        // A different partner starts its own sequence.
        let other = service
            .create_step(&msg, LinkPartnerName::from("link3"))
            .await
            .unwrap();
        assert_eq!(other.attempt(), 1);
    }

    /// Store whose attempt counter lags behind the steps it holds, like a
    /// competing writer landing between the read and the insert.
    struct StaleCounterStore(MemoryStore);

    #[async_trait::async_trait]
    impl TransportStepStore for StaleCounterStore {
        async fn insert_step(&self, step: &TransportStep) -> docbridge_store::Result<()> {
            self.0.insert_step(step).await
        }

        async fn save_step(&self, step: &TransportStep) -> docbridge_store::Result<()> {
            self.0.save_step(step).await
        }

        async fn find_step(
            &self,
            transport_id: &TransportId,
        ) -> docbridge_store::Result<Option<TransportStep>> {
            self.0.find_step(transport_id).await
        }

        async fn highest_attempt(
            &self,
            _message_id: &ConnectorMessageId,
            _partner: &LinkPartnerName,
        ) -> docbridge_store::Result<u32> {
            Ok(0)
        }

        async fn find_steps_by_message(
            &self,
            message_id: &ConnectorMessageId,
        ) -> docbridge_store::Result<Vec<TransportStep>> {
            self.0.find_steps_by_message(message_id).await
        }

        async fn find_last_attempt_steps_in_states(
            &self,
            states: &[TransportState],
            partners: &[LinkPartnerName],
        ) -> docbridge_store::Result<Vec<TransportStep>> {
            self.0.find_last_attempt_steps_in_states(states, partners).await
        }

        async fn all_link_partner_names(&self) -> docbridge_store::Result<Vec<LinkPartnerName>> {
            self.0.all_link_partner_names().await
        }
    }

    #[tokio::test]
    async fn test_create_step_skips_attempts_taken_by_competing_writer() {
        let store = Arc::new(StaleCounterStore(MemoryStore::new()));
        let service = TransportStepService::new(Arc::clone(&store));
        let partner = LinkPartnerName::from("link2");

        // Attempts 1 and 2 already exist while the counter reports none.
        let mut taken = TransportStep::new(
            ConnectorMessageId::from("id002"),
            partner.clone(),
            1,
        )
        .unwrap();
        taken
            .add_transport_status_at(TransportState::Pending, 10, None)
            .unwrap();
        store.insert_step(&taken).await.unwrap();
        store
            .insert_step(
                &TransportStep::new(ConnectorMessageId::from("id002"), partner.clone(), 2)
                    .unwrap(),
            )
            .await
            .unwrap();

        let step = service.create_step(&message("id002"), partner).await.unwrap();
        assert_eq!(step.attempt(), 3);
        assert_eq!(step.transport_id().as_str(), "id002_link2_3");

        // The competing writer's step kept its history.
        let first = store
            .find_step(&TransportId::from("id002_link2_1"))
            .await
            .unwrap()
            .unwrap();
        assert!(first.is_in_pending_state());
    }

    #[tokio::test]
    async fn test_status_lifecycle_to_terminal() {
        let service = service();
        let msg = message("id002");
        let step = service
            .create_step(&msg, LinkPartnerName::from("link2"))
            .await
            .unwrap();
        let id = step.transport_id().clone();

        service
            .record_status(&id, TransportState::Pending, None)
            .await
            .unwrap();
        service
            .record_status(&id, TransportState::Accepted, None)
            .await
            .unwrap();
        let step = service
            .record_status(&id, TransportState::Delivered, None)
            .await
            .unwrap();
        assert!(step.final_state_reached().is_some());

        // The stored step rejects further transitions.
        let err = service
            .record_status(&id, TransportState::Failed, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Validation(ValidationError::PriorityRegression { .. })
        ));
        let reloaded = service.find_step(&id).await.unwrap();
        assert_eq!(reloaded.status_updates().len(), 3);
    }

    #[tokio::test]
    async fn test_find_pending_steps_filters_partner_and_head() {
        let service = service();
        let link4 = LinkPartnerName::from("link4");

        // Pending step towards link4: included.
        let step_a = service
            .create_step(&message("a"), link4.clone())
            .await
            .unwrap();
        service
            .record_status(step_a.transport_id(), TransportState::Pending, None)
            .await
            .unwrap();

        // Step towards link4 that moved past pending: excluded.
        let step_b = service
            .create_step(&message("b"), link4.clone())
            .await
            .unwrap();
        service
            .record_status(step_b.transport_id(), TransportState::Pending, None)
            .await
            .unwrap();
        service
            .record_status(step_b.transport_id(), TransportState::Accepted, None)
            .await
            .unwrap();

        // Pending step towards another partner: excluded.
        let step_c = service
            .create_step(&message("c"), LinkPartnerName::from("link5"))
            .await
            .unwrap();
        service
            .record_status(step_c.transport_id(), TransportState::Pending, None)
            .await
            .unwrap();

        let pending = service.find_pending_steps_by(&link4).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].connector_message_id(),
            &ConnectorMessageId::from("a")
        );
    }

    #[tokio::test]
    async fn test_retry_hides_older_pending_attempt() {
        let service = service();
        let partner = LinkPartnerName::from("link4");
        let msg = message("a");

        let first = service.create_step(&msg, partner.clone()).await.unwrap();
        service
            .record_status(first.transport_id(), TransportState::Pending, None)
            .await
            .unwrap();

        // A second attempt without any status yet supersedes the first.
        service.create_step(&msg, partner.clone()).await.unwrap();
        assert!(service.find_pending_steps_by(&partner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_link_partners() {
        let service = service();
        service
            .create_step(&message("a"), LinkPartnerName::from("gw"))
            .await
            .unwrap();
        service
            .create_step(&message("a"), LinkPartnerName::from("backend1"))
            .await
            .unwrap();

        let partners = service.find_all_link_partners().await.unwrap();
        assert_eq!(
            partners,
            vec![LinkPartnerName::from("backend1"), LinkPartnerName::from("gw")]
        );
    }
}
