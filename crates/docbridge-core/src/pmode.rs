//! PMode configuration sets: versioned, lane-scoped catalogs of parties,
//! actions and services, together with the connector keystore reference.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{now_millis, LaneId};

/// Role of a party within an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyRoleType {
    Initiator,
    Responder,
}

impl PartyRoleType {
    pub const fn db_name(&self) -> &'static str {
        match self {
            PartyRoleType::Initiator => "INITIATOR",
            PartyRoleType::Responder => "RESPONDER",
        }
    }

    pub fn from_db_name(name: &str) -> Option<Self> {
        match name {
            "INITIATOR" => Some(PartyRoleType::Initiator),
            "RESPONDER" => Some(PartyRoleType::Responder),
            _ => None,
        }
    }
}

impl fmt::Display for PartyRoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.db_name())
    }
}

/// A party a lane may exchange messages with.
///
/// Identity is the full tuple: the same party id may appear once as
/// initiator and once as responder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub party_id: String,
    pub party_id_type: Option<String>,
    pub role: Option<String>,
    pub role_type: PartyRoleType,
}

impl Party {
    pub fn new(party_id: impl Into<String>, role_type: PartyRoleType) -> Self {
        Self {
            party_id: party_id.into(),
            party_id_type: None,
            role: None,
            role_type,
        }
    }
}

/// A business action known to a configuration set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub action: String,
}

impl Action {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}

/// A business service known to a configuration set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Service {
    pub service: String,
    pub service_type: Option<String>,
}

impl Service {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            service_type: None,
        }
    }
}

/// Format of an uploaded keystore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeystoreType {
    Jks,
    Pkcs12,
}

impl KeystoreType {
    pub const fn db_name(&self) -> &'static str {
        match self {
            KeystoreType::Jks => "JKS",
            KeystoreType::Pkcs12 => "PKCS12",
        }
    }

    pub fn from_db_name(name: &str) -> Option<Self> {
        match name {
            "JKS" => Some(KeystoreType::Jks),
            "PKCS12" => Some(KeystoreType::Pkcs12),
            _ => None,
        }
    }

    pub const fn file_extension(&self) -> &'static str {
        match self {
            KeystoreType::Jks => ".jks",
            KeystoreType::Pkcs12 => ".p12",
        }
    }
}

/// Reference to a stored keystore by its uuid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeystoreRef {
    pub uuid: String,
}

impl KeystoreRef {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }
}

/// An uploaded keystore, addressed by uuid.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Keystore {
    pub uuid: String,
    pub bytes: Bytes,
    pub password: String,
    pub keystore_type: KeystoreType,
    pub description: Option<String>,
    pub uploaded: i64,
}

impl Keystore {
    pub fn new(
        uuid: impl Into<String>,
        bytes: Bytes,
        password: impl Into<String>,
        keystore_type: KeystoreType,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            bytes,
            password: password.into(),
            keystore_type,
            description: None,
            uploaded: now_millis(),
        }
    }
}

// Keystore bytes and password stay out of Debug output.
impl fmt::Debug for Keystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keystore")
            .field("uuid", &self.uuid)
            .field("keystore_type", &self.keystore_type)
            .field("size", &self.bytes.len())
            .field("uploaded", &self.uploaded)
            .finish()
    }
}

/// One versioned PMode configuration set of a lane.
///
/// At most one set per lane is active at any time; activating a new set
/// deactivates the current one. Inactive sets are kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PModeSet {
    pub lane_id: LaneId,
    pub created: i64,
    pub active: bool,
    pub description: String,
    /// The raw uploaded PMode document.
    pub pmodes: Bytes,
    pub connector_store: Option<KeystoreRef>,
    pub parties: Vec<Party>,
    pub actions: Vec<Action>,
    pub services: Vec<Service>,
}

impl PModeSet {
    /// A fresh, empty, active set for the given lane.
    pub fn new_for_lane(lane_id: LaneId) -> Self {
        Self {
            lane_id,
            created: now_millis(),
            active: true,
            description: String::new(),
            pmodes: Bytes::new(),
            connector_store: None,
            parties: Vec::new(),
            actions: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn find_action(&self, action: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.action == action)
    }

    /// All services with the given name, regardless of type.
    pub fn find_services(&self, service: &str) -> Vec<&Service> {
        self.services.iter().filter(|s| s.service == service).collect()
    }

    /// All parties with the given id, regardless of role.
    pub fn find_parties(&self, party_id: &str) -> Vec<&Party> {
        self.parties.iter().filter(|p| p.party_id == party_id).collect()
    }

    pub fn find_party(&self, party_id: &str, role_type: PartyRoleType) -> Option<&Party> {
        self.parties
            .iter()
            .find(|p| p.party_id == party_id && p.role_type == role_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_party_id_may_hold_both_roles() {
        let mut set = PModeSet::new_for_lane(LaneId::from("lane1"));
        set.parties.push(Party::new("A", PartyRoleType::Initiator));
        set.parties.push(Party::new("A", PartyRoleType::Responder));

        assert_eq!(set.find_parties("A").len(), 2);
        assert!(set.find_party("A", PartyRoleType::Initiator).is_some());
        assert!(set.find_party("A", PartyRoleType::Responder).is_some());
        assert!(set.find_party("B", PartyRoleType::Initiator).is_none());
    }

    #[test]
    fn test_find_services_ignores_type() {
        let mut set = PModeSet::new_for_lane(LaneId::from("lane1"));
        set.services.push(Service::new("EPO"));
        set.services.push(Service {
            service: "EPO".to_owned(),
            service_type: Some("urn:e-codex".to_owned()),
        });
        assert_eq!(set.find_services("EPO").len(), 2);
        assert!(set.find_services("other").is_empty());
    }

    #[test]
    fn test_keystore_debug_hides_secrets() {
        let ks = Keystore::new("uuid1", Bytes::from_static(b"secret"), "pw", KeystoreType::Jks);
        let rendered = format!("{:?}", ks);
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("pw"));
    }

    #[test]
    fn test_keystore_type_extension() {
        assert_eq!(KeystoreType::Jks.file_extension(), ".jks");
        assert_eq!(KeystoreType::Pkcs12.file_extension(), ".p12");
    }
}
