//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use bytes::Bytes;

use docbridge::{Connector, ConnectorConfig};
use docbridge_core::{
    Action, Confirmation, ConnectorMessageId, EvidenceType, Keystore, KeystoreRef, KeystoreType,
    LaneId, Message, MessageContent, MessageDetails, MessageDirection, PModeSet, Party,
    PartyRoleType, Service,
};
use docbridge_store::{KeystoreStore, MemoryStore};

/// Uuid of the trust store every fixture catalog references.
pub const FIXTURE_STORE_UUID: &str = "store1";

/// A test fixture with a connector over a fresh in-memory store.
pub struct TestFixture {
    pub lane: LaneId,
    pub connector: Connector<MemoryStore>,
}

impl TestFixture {
    /// A bare connector: default lane exists, no configuration set yet.
    pub async fn bare() -> Self {
        let connector = Connector::new(MemoryStore::new(), ConnectorConfig::default());
        let lane = connector
            .lanes()
            .get_default()
            .await
            .expect("default lane bootstrap")
            .id;
        Self { lane, connector }
    }

    /// A connector whose default lane carries the fixture catalog:
    /// parties A (initiator) and B (responder), action `Form_A`, service
    /// `EPO`, trust store [`FIXTURE_STORE_UUID`].
    pub async fn ready() -> Self {
        let fixture = Self::bare().await;
        fixture
            .connector
            .store()
            .persist_keystore(&fixture_keystore())
            .await
            .expect("persist fixture keystore");
        fixture
            .connector
            .pmodes()
            .update_configuration_set(catalog_set(fixture.lane.clone()))
            .await
            .expect("activate fixture catalog");
        fixture
    }
}

/// The fixture trust store.
pub fn fixture_keystore() -> Keystore {
    Keystore::new(
        FIXTURE_STORE_UUID,
        Bytes::from_static(b"fixture keystore bytes"),
        "changeit",
        KeystoreType::Jks,
    )
}

/// A configuration set carrying the fixture catalog for `lane`.
pub fn catalog_set(lane: LaneId) -> PModeSet {
    let mut set = PModeSet::new_for_lane(lane);
    set.description = "fixture catalog".to_owned();
    set.connector_store = Some(KeystoreRef::new(FIXTURE_STORE_UUID));
    set.parties.push(Party::new("A", PartyRoleType::Initiator));
    set.parties.push(Party::new("B", PartyRoleType::Responder));
    set.actions.push(Action::new("Form_A"));
    set.services.push(Service::new("EPO"));
    set
}

/// Message details referencing the fixture catalog, travelling backend
/// to gateway.
pub fn catalog_details() -> MessageDetails {
    let mut details = MessageDetails::new(MessageDirection::BackendToGateway);
    details.action = Some(Action::new("Form_A"));
    details.service = Some(Service::new("EPO"));
    details.from_party = Some(Party::new("A", PartyRoleType::Initiator));
    details.to_party = Some(Party::new("B", PartyRoleType::Responder));
    details
}

/// A business message with the given id, resolvable against the fixture
/// catalog.
pub fn business_message(id: &str) -> Message {
    Message::business_with_id(
        ConnectorMessageId::from(id),
        catalog_details(),
        MessageContent::new(Bytes::from_static(b"<form-a/>")),
    )
}

/// An evidence message carrying one confirmation about `caused_by`.
pub fn evidence_message(id: &str, caused_by: &str, confirmation: Confirmation) -> Message {
    let mut details = MessageDetails::new(MessageDirection::GatewayToBackend);
    details.caused_by = Some(ConnectorMessageId::from(caused_by));
    Message::evidence_with_id(ConnectorMessageId::from(id), details, confirmation)
}

/// A delivery confirmation with the given evidence bytes.
pub fn delivery_confirmation(bytes: &'static [u8]) -> Confirmation {
    Confirmation::new(EvidenceType::Delivery, Some(Bytes::from_static(bytes)))
}
