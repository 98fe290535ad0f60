//! The Connector: unified API over the docbridge services.
//!
//! Brings the lane registry, PMode lifecycle, transport steps, evidence
//! correlation and routing together into one submission surface.

use std::sync::Arc;

use tracing::{info, warn};

use docbridge_config::{KeystoreService, LaneRegistry, PModeService};
use docbridge_core::{
    now_millis, ConnectorMessageId, LaneId, LinkPartnerName, Message, MessageDetails,
    MessageDirection, MessageProcessError, PModeSet, TransportId, TransportState, TransportStep,
};
use docbridge_store::{ConnectorStore, StoreError};
use docbridge_transport::{
    EvidenceService, RoutingRuleEvaluator, RoutingService, TransportStepService,
};

use crate::error::{ConnectorError, Result};

/// Configuration for the connector facade.
pub struct ConnectorConfig {
    /// Link partner used when no routing rule matches.
    pub default_link: LinkPartnerName,
    /// Interpreter for routing rule match clauses.
    pub evaluator: Box<dyn RoutingRuleEvaluator>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            default_link: LinkPartnerName::from("default_gateway"),
            // No rules match until a real evaluator is plugged in.
            evaluator: Box::new(|_: &docbridge_core::RoutingRule, _: &MessageDetails| false),
        }
    }
}

/// The main connector facade.
///
/// Generic over the storage backend; every service shares the same
/// store instance.
pub struct Connector<S: ConnectorStore> {
    store: Arc<S>,
    lanes: LaneRegistry<S>,
    pmodes: PModeService<S>,
    keystores: KeystoreService<S>,
    steps: TransportStepService<S>,
    evidence: EvidenceService<S>,
    routing: RoutingService<S>,
    evaluator: Box<dyn RoutingRuleEvaluator>,
}

impl<S: ConnectorStore> Connector<S> {
    pub fn new(store: S, config: ConnectorConfig) -> Self {
        let store = Arc::new(store);
        Self {
            lanes: LaneRegistry::new(Arc::clone(&store)),
            pmodes: PModeService::new(Arc::clone(&store)),
            keystores: KeystoreService::new(Arc::clone(&store)),
            steps: TransportStepService::new(Arc::clone(&store)),
            evidence: EvidenceService::new(Arc::clone(&store)),
            routing: RoutingService::new(Arc::clone(&store), config.default_link),
            evaluator: config.evaluator,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lanes(&self) -> &LaneRegistry<S> {
        &self.lanes
    }

    pub fn pmodes(&self) -> &PModeService<S> {
        &self.pmodes
    }

    pub fn keystores(&self) -> &KeystoreService<S> {
        &self.keystores
    }

    pub fn steps(&self) -> &TransportStepService<S> {
        &self.steps
    }

    pub fn evidence(&self) -> &EvidenceService<S> {
        &self.evidence
    }

    pub fn routing(&self) -> &RoutingService<S> {
        &self.routing
    }

    // ─────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────

    /// Accept a message into the connector.
    ///
    /// Verifies the lane, resolves the message's AS4 references against
    /// the lane's active configuration set, persists the message and
    /// opens a Pending transport step towards the routed link partner.
    /// Confirmations carried by an evidence message are correlated with
    /// the business message they attest.
    pub async fn submit_message(
        &self,
        lane_id: &LaneId,
        mut message: Message,
    ) -> Result<TransportStep> {
        if self.lanes.get(lane_id).await?.is_none() {
            return Err(ConnectorError::LaneNotFound(lane_id.clone()));
        }
        message.set_lane_id(lane_id.clone());

        let set = self
            .pmodes
            .current_set(lane_id)
            .await?
            .ok_or_else(|| ConnectorError::NoActiveConfiguration(lane_id.clone()))?;
        resolve_references(&set, message.details_mut())?;

        message.validate_for_persist()?;
        if self
            .store
            .find_message(message.connector_message_id())
            .await?
            .is_some()
        {
            return Err(ConnectorError::DuplicateMessage(
                message.connector_message_id().clone(),
            ));
        }

        // Correlation runs before the message is persisted: a rejected
        // correlation must not leave the evidence message itself behind,
        // so the caller can retry with the same id.
        self.correlate_transported_evidence(&message).await?;

        match self.store.persist_message(&message).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(ConnectorError::DuplicateMessage(
                    message.connector_message_id().clone(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        let partner = self
            .routing
            .resolve_link_partner(lane_id, message.details(), self.evaluator.as_ref())
            .await?;
        let step = self.steps.create_step(&message, partner).await?;
        let step = self
            .steps
            .record_status(step.transport_id(), TransportState::Pending, None)
            .await?;
        info!(
            message = %message.connector_message_id(),
            transport_id = %step.transport_id(),
            "accepted message"
        );
        Ok(step)
    }

    /// Attach the confirmations carried by an evidence message to the
    /// business message they attest.
    async fn correlate_transported_evidence(&self, message: &Message) -> Result<()> {
        if !message.is_evidence_message() {
            return Ok(());
        }
        let Some(caused_by) = message.details().caused_by.clone() else {
            warn!(
                message = %message.connector_message_id(),
                "evidence message without a caused-by reference"
            );
            return Ok(());
        };
        for confirmation in message.transported_confirmations() {
            self.evidence
                .persist_evidence_for_message(&caused_by, confirmation.clone())
                .await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport status
    // ─────────────────────────────────────────────────────────────────────

    /// Fold a status update into a transport step.
    ///
    /// On Delivered the message's delivered-to timestamp for the target
    /// side is stamped; on Failed a processing error is recorded against
    /// the message.
    pub async fn record_transport_status(
        &self,
        transport_id: &TransportId,
        state: TransportState,
        text: Option<String>,
    ) -> Result<TransportStep> {
        let step = self.steps.record_status(transport_id, state, text.clone()).await?;

        match state {
            TransportState::Delivered => {
                self.stamp_delivered(step.connector_message_id()).await?;
            }
            TransportState::Failed => {
                self.record_failure(step.connector_message_id(), text).await?;
            }
            _ => {}
        }
        Ok(step)
    }

    async fn stamp_delivered(&self, message_id: &ConnectorMessageId) -> Result<()> {
        let Some(mut message) = self.store.find_message(message_id).await? else {
            return Ok(());
        };
        let now = now_millis();
        match message.details().direction {
            Some(MessageDirection::BackendToGateway) => {
                message.details_mut().delivered_to_gateway = Some(now);
            }
            Some(MessageDirection::GatewayToBackend) => {
                message.details_mut().delivered_to_backend = Some(now);
            }
            None => return Ok(()),
        }
        Ok(self.store.update_message(&message).await?)
    }

    async fn record_failure(
        &self,
        message_id: &ConnectorMessageId,
        text: Option<String>,
    ) -> Result<()> {
        let Some(mut message) = self.store.find_message(message_id).await? else {
            return Ok(());
        };
        let mut error =
            MessageProcessError::new(text.unwrap_or_else(|| "transport failed".to_owned()));
        error.error_source = Some("transport".to_owned());
        message.add_error(error);
        Ok(self.store.update_message(&message).await?)
    }
}

/// Resolve the message's service, action and party references against
/// the active configuration set, canonicalizing each to the catalog
/// entry it names.
fn resolve_references(set: &PModeSet, details: &mut MessageDetails) -> Result<()> {
    if let Some(action) = details.action.clone() {
        let resolved = set
            .find_action(&action.action)
            .ok_or_else(|| ConnectorError::UnknownReference(format!("action {}", action.action)))?;
        details.action = Some(resolved.clone());
    }

    if let Some(service) = details.service.clone() {
        let matches: Vec<_> = set
            .find_services(&service.service)
            .into_iter()
            .filter(|s| service.service_type.is_none() || s.service_type == service.service_type)
            .collect();
        match matches.as_slice() {
            [] => {
                return Err(ConnectorError::UnknownReference(format!(
                    "service {}",
                    service.service
                )))
            }
            [only] => details.service = Some((*only).clone()),
            _ => {
                return Err(ConnectorError::AmbiguousReference(format!(
                    "service {}",
                    service.service
                )))
            }
        }
    }

    for party_field in [&mut details.from_party, &mut details.to_party] {
        let Some(party) = party_field.clone() else {
            continue;
        };
        let matches: Vec<_> = set
            .find_parties(&party.party_id)
            .into_iter()
            .filter(|p| p.role_type == party.role_type)
            .collect();
        match matches.as_slice() {
            [] => {
                return Err(ConnectorError::UnknownReference(format!(
                    "party {} as {}",
                    party.party_id, party.role_type
                )))
            }
            [only] => *party_field = Some((*only).clone()),
            _ => {
                return Err(ConnectorError::AmbiguousReference(format!(
                    "party {}",
                    party.party_id
                )))
            }
        }
    }
    Ok(())
}
