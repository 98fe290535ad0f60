//! In-memory implementation of the store traits.
//!
//! Primarily for tests. Same semantics as SQLite but nothing survives a
//! drop.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use docbridge_core::{
    BusinessDomain, Confirmation, ConnectorMessageId, EvidenceId, EvidenceType, Keystore, LaneId,
    LinkPartnerName, Message, PModeSet, RoutingRule, TransportId, TransportState, TransportStep,
};

use crate::error::{Result, StoreError};
use crate::traits::{
    EvidenceStore, KeystoreStore, LaneStore, MessageStore, PModeSetStore, RoutingRuleStore,
    TransportStepStore,
};

/// In-memory store implementing every store trait.
///
/// Thread-safe via RwLock; all data is lost when the store is dropped.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    lanes: HashMap<LaneId, BusinessDomain>,
    messages: HashMap<ConnectorMessageId, Message>,
    evidences: Vec<StoredEvidence>,
    next_evidence_id: i64,
    steps: HashMap<TransportId, TransportStep>,
    pmode_sets: Vec<PModeSet>,
    keystores: HashMap<String, Keystore>,
    routing_rules: HashMap<(LaneId, String), RoutingRule>,
}

struct StoredEvidence {
    id: EvidenceId,
    message_id: ConnectorMessageId,
    confirmation: Confirmation,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_evidence_id: 1,
                ..Inner::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    /// Related confirmations are rebuilt from the evidence records on
    /// every load, so the snapshot and the evidence table cannot drift.
    fn hydrate(&self, message: &Message) -> Message {
        let mut message = message.clone();
        let related: Vec<Confirmation> = self
            .evidences
            .iter()
            .filter(|e| &e.message_id == message.connector_message_id())
            .map(|e| e.confirmation.clone())
            .collect();
        message.set_related_confirmations(related);
        message
    }
}

#[async_trait]
impl LaneStore for MemoryStore {
    async fn find_lane(&self, id: &LaneId) -> Result<Option<BusinessDomain>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.lanes.get(id).cloned())
    }

    async fn find_all_lanes(&self) -> Result<Vec<BusinessDomain>> {
        let inner = self.inner.read().unwrap();
        let mut lanes: Vec<_> = inner.lanes.values().cloned().collect();
        lanes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(lanes)
    }

    async fn create_lane(&self, lane: &BusinessDomain) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.lanes.contains_key(&lane.id) {
            return Err(StoreError::Duplicate(format!("lane {}", lane.id)));
        }
        inner.lanes.insert(lane.id.clone(), lane.clone());
        Ok(())
    }

    async fn update_lane(&self, lane: &BusinessDomain) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.lanes.contains_key(&lane.id) {
            return Err(StoreError::NotFound(format!("lane {}", lane.id)));
        }
        inner.lanes.insert(lane.id.clone(), lane.clone());
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn persist_message(&self, message: &Message) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let id = message.connector_message_id().clone();
        if inner.messages.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("message {}", id)));
        }
        inner.messages.insert(id, message.clone());
        Ok(())
    }

    async fn find_message(&self, id: &ConnectorMessageId) -> Result<Option<Message>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.messages.get(id).map(|m| inner.hydrate(m)))
    }

    async fn find_messages_by_ebms_id(&self, ebms_id: &str) -> Result<Vec<Message>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .messages
            .values()
            .filter(|m| m.details().ebms_message_id.as_deref() == Some(ebms_id))
            .map(|m| inner.hydrate(m))
            .collect())
    }

    async fn update_message(&self, message: &Message) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let id = message.connector_message_id().clone();
        if !inner.messages.contains_key(&id) {
            return Err(StoreError::NotFound(format!("message {}", id)));
        }
        inner.messages.insert(id, message.clone());
        Ok(())
    }
}

#[async_trait]
impl EvidenceStore for MemoryStore {
    async fn persist_evidence(
        &self,
        message_id: &ConnectorMessageId,
        confirmation: &Confirmation,
    ) -> Result<EvidenceId> {
        let mut inner = self.inner.write().unwrap();
        if !inner.messages.contains_key(message_id) {
            return Err(StoreError::NotFound(format!("message {}", message_id)));
        }
        let id = EvidenceId(inner.next_evidence_id);
        inner.next_evidence_id += 1;
        let mut confirmation = confirmation.clone();
        confirmation.evidence_id = Some(id);
        inner.evidences.push(StoredEvidence {
            id,
            message_id: message_id.clone(),
            confirmation,
        });
        Ok(id)
    }

    async fn count_evidences_of_type(
        &self,
        message_id: &ConnectorMessageId,
        evidence_type: EvidenceType,
    ) -> Result<u32> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .evidences
            .iter()
            .filter(|e| &e.message_id == message_id && e.confirmation.evidence_type == evidence_type)
            .count() as u32)
    }

    async fn find_evidences(&self, message_id: &ConnectorMessageId) -> Result<Vec<Confirmation>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .evidences
            .iter()
            .filter(|e| &e.message_id == message_id)
            .map(|e| e.confirmation.clone())
            .collect())
    }

    async fn set_evidence_delivered_to_gateway(&self, id: EvidenceId, at: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let stored = inner
            .evidences
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("evidence {}", id)))?;
        stored.confirmation.delivered_to_gateway = Some(at);
        Ok(())
    }

    async fn set_evidence_delivered_to_backend(&self, id: EvidenceId, at: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let stored = inner
            .evidences
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("evidence {}", id)))?;
        stored.confirmation.delivered_to_backend = Some(at);
        Ok(())
    }
}

#[async_trait]
impl TransportStepStore for MemoryStore {
    async fn insert_step(&self, step: &TransportStep) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.steps.contains_key(step.transport_id()) {
            return Err(StoreError::Duplicate(format!(
                "transport step {}",
                step.transport_id()
            )));
        }
        inner.steps.insert(step.transport_id().clone(), step.clone());
        Ok(())
    }

    async fn save_step(&self, step: &TransportStep) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.steps.insert(step.transport_id().clone(), step.clone());
        Ok(())
    }

    async fn find_step(&self, transport_id: &TransportId) -> Result<Option<TransportStep>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.steps.get(transport_id).cloned())
    }

    async fn highest_attempt(
        &self,
        message_id: &ConnectorMessageId,
        partner: &LinkPartnerName,
    ) -> Result<u32> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .steps
            .values()
            .filter(|s| s.connector_message_id() == message_id && s.link_partner_name() == partner)
            .map(|s| s.attempt())
            .max()
            .unwrap_or(0))
    }

    async fn find_steps_by_message(
        &self,
        message_id: &ConnectorMessageId,
    ) -> Result<Vec<TransportStep>> {
        let inner = self.inner.read().unwrap();
        let mut steps: Vec<_> = inner
            .steps
            .values()
            .filter(|s| s.connector_message_id() == message_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| (s.link_partner_name().clone(), s.attempt()));
        Ok(steps)
    }

    async fn find_last_attempt_steps_in_states(
        &self,
        states: &[TransportState],
        partners: &[LinkPartnerName],
    ) -> Result<Vec<TransportStep>> {
        let inner = self.inner.read().unwrap();
        Ok(last_attempt_steps_in_states(
            inner.steps.values(),
            states,
            partners,
        ))
    }

    async fn all_link_partner_names(&self) -> Result<Vec<LinkPartnerName>> {
        let inner = self.inner.read().unwrap();
        let mut names: Vec<_> = inner
            .steps
            .values()
            .map(|s| s.link_partner_name().clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Shared filter: per (message, partner) only the highest attempt counts,
/// and its head status must be one of `states`.
pub(crate) fn last_attempt_steps_in_states<'a>(
    steps: impl Iterator<Item = &'a TransportStep>,
    states: &[TransportState],
    partners: &[LinkPartnerName],
) -> Vec<TransportStep> {
    let mut last: HashMap<(ConnectorMessageId, LinkPartnerName), &TransportStep> = HashMap::new();
    for step in steps.filter(|s| partners.contains(s.link_partner_name())) {
        let key = (
            step.connector_message_id().clone(),
            step.link_partner_name().clone(),
        );
        match last.get(&key) {
            Some(existing) if existing.attempt() >= step.attempt() => {}
            _ => {
                last.insert(key, step);
            }
        }
    }
    let mut selected: Vec<TransportStep> = last
        .into_values()
        .filter(|s| {
            s.head()
                .map(|u| states.contains(&u.transport_state))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    selected.sort_by_key(|s| s.created());
    selected
}

#[async_trait]
impl PModeSetStore for MemoryStore {
    async fn current_active_set(&self, lane_id: &LaneId) -> Result<Option<PModeSet>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .pmode_sets
            .iter()
            .find(|s| &s.lane_id == lane_id && s.active)
            .cloned())
    }

    async fn inactive_sets(&self, lane_id: &LaneId) -> Result<Vec<PModeSet>> {
        let inner = self.inner.read().unwrap();
        let mut sets: Vec<_> = inner
            .pmode_sets
            .iter()
            .filter(|s| &s.lane_id == lane_id && !s.active)
            .cloned()
            .collect();
        sets.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(sets)
    }

    async fn replace_active_set(&self, set: &PModeSet) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for existing in inner
            .pmode_sets
            .iter_mut()
            .filter(|s| s.lane_id == set.lane_id)
        {
            existing.active = false;
        }
        let mut set = set.clone();
        set.active = true;
        inner.pmode_sets.push(set);
        Ok(())
    }
}

#[async_trait]
impl KeystoreStore for MemoryStore {
    async fn persist_keystore(&self, keystore: &Keystore) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.keystores.contains_key(&keystore.uuid) {
            return Err(StoreError::Duplicate(format!("keystore {}", keystore.uuid)));
        }
        inner.keystores.insert(keystore.uuid.clone(), keystore.clone());
        Ok(())
    }

    async fn find_keystore(&self, uuid: &str) -> Result<Option<Keystore>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.keystores.get(uuid).cloned())
    }

    async fn update_keystore_password(&self, uuid: &str, password: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let keystore = inner
            .keystores
            .get_mut(uuid)
            .ok_or_else(|| StoreError::NotFound(format!("keystore {}", uuid)))?;
        keystore.password = password.to_owned();
        Ok(())
    }
}

#[async_trait]
impl RoutingRuleStore for MemoryStore {
    async fn find_routing_rules(&self, lane_id: &LaneId) -> Result<Vec<RoutingRule>> {
        let inner = self.inner.read().unwrap();
        let mut rules: Vec<_> = inner
            .routing_rules
            .values()
            .filter(|r| &r.lane_id == lane_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(rules)
    }

    async fn upsert_routing_rule(&self, rule: &RoutingRule) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .routing_rules
            .insert((rule.lane_id.clone(), rule.rule_id.clone()), rule.clone());
        Ok(())
    }

    async fn delete_routing_rule(&self, lane_id: &LaneId, rule_id: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .routing_rules
            .remove(&(lane_id.clone(), rule_id.to_owned()))
            .ok_or_else(|| StoreError::NotFound(format!("routing rule {}", rule_id)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use docbridge_core::{MessageContent, MessageDetails, MessageDirection};

    fn message(id: &str) -> Message {
        Message::business_with_id(
            ConnectorMessageId::from(id),
            MessageDetails::new(MessageDirection::BackendToGateway),
            MessageContent::new(Bytes::from_static(b"<x/>")),
        )
    }

    #[tokio::test]
    async fn test_duplicate_message_rejected() {
        let store = MemoryStore::new();
        store.persist_message(&message("id1")).await.unwrap();
        let err = store.persist_message(&message("id1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_evidence_requires_message() {
        let store = MemoryStore::new();
        let conf = Confirmation::new(EvidenceType::Delivery, None);
        let err = store
            .persist_evidence(&ConnectorMessageId::from("ghost"), &conf)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_loaded_message_carries_related_confirmations() {
        let store = MemoryStore::new();
        store.persist_message(&message("id1")).await.unwrap();

        let conf = Confirmation::new(EvidenceType::Delivery, Some(Bytes::from_static(b"<e/>")));
        let id = store
            .persist_evidence(&ConnectorMessageId::from("id1"), &conf)
            .await
            .unwrap();

        let loaded = store
            .find_message(&ConnectorMessageId::from("id1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.related_confirmations().len(), 1);
        assert_eq!(loaded.related_confirmations()[0].evidence_id, Some(id));
    }

    #[tokio::test]
    async fn test_insert_step_rejects_taken_attempt() {
        let store = MemoryStore::new();
        let step = TransportStep::new(
            ConnectorMessageId::from("id1"),
            LinkPartnerName::from("gw"),
            1,
        )
        .unwrap();
        store.insert_step(&step).await.unwrap();

        let err = store.insert_step(&step).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_highest_attempt_starts_at_zero() {
        let store = MemoryStore::new();
        let n = store
            .highest_attempt(&ConnectorMessageId::from("id1"), &LinkPartnerName::from("gw"))
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_replace_active_set_keeps_one_active() {
        let store = MemoryStore::new();
        let lane = LaneId::from("lane1");

        let first = PModeSet::new_for_lane(lane.clone());
        store.replace_active_set(&first).await.unwrap();
        let mut second = PModeSet::new_for_lane(lane.clone());
        second.created = first.created + 1;
        store.replace_active_set(&second).await.unwrap();

        let active = store.current_active_set(&lane).await.unwrap().unwrap();
        assert_eq!(active.created, second.created);
        assert_eq!(store.inactive_sets(&lane).await.unwrap().len(), 1);
    }
}
