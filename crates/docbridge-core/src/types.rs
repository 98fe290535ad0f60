//! Strong identifier types for docbridge.
//!
//! Every identifier domain gets its own newtype to prevent misuse at
//! compile time: a link partner name can never be passed where a lane id
//! is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The connector-wide unique identifier of a message.
///
/// Assigned once at message creation and immutable thereafter. Independent
/// of any gateway- or backend-local message id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectorMessageId(String);

impl ConnectorMessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConnectorMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectorMessageId({})", self.0)
    }
}

impl fmt::Display for ConnectorMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectorMessageId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ConnectorMessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The identifier of a business domain (lane).
///
/// All catalogs and messages belong to exactly one lane.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneId(String);

impl LaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LaneId({})", self.0)
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LaneId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for LaneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The name of a link partner: a remote endpoint a lane exchanges
/// messages with.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkPartnerName(String);

impl LinkPartnerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for LinkPartnerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkPartnerName({})", self.0)
    }
}

impl fmt::Display for LinkPartnerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LinkPartnerName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for LinkPartnerName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The name of a shared link configuration.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkConfigName(String);

impl LinkConfigName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LinkConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkConfigName({})", self.0)
    }
}

impl fmt::Display for LinkConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LinkConfigName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for LinkConfigName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The identifier of one transport attempt of one message to one link
/// partner.
///
/// Derived from the message id, the link partner name and the attempt
/// number, so it is unique per delivery attempt.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransportId(String);

impl TransportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the transport id from its step coordinates.
    pub fn derive(message_id: &ConnectorMessageId, partner: &LinkPartnerName, attempt: u32) -> Self {
        Self(format!("{}_{}_{}", message_id, partner, attempt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransportId({})", self.0)
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransportId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for TransportId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The storage-assigned identity of a persisted evidence record.
///
/// Evidence dedup happens by this id, not by content — unlike the
/// transported-confirmation dedup on the message aggregate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvidenceId(pub i64);

impl fmt::Debug for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvidenceId({})", self.0)
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ConnectorMessageId::generate();
        let b = ConnectorMessageId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_transport_id_derivation() {
        let id = TransportId::derive(
            &ConnectorMessageId::from("msg1"),
            &LinkPartnerName::from("gw"),
            3,
        );
        assert_eq!(id.as_str(), "msg1_gw_3");
    }

    #[test]
    fn test_ids_from_owned_strings() {
        assert_eq!(LaneId::from("laneA".to_owned()), LaneId::from("laneA"));
        assert_eq!(
            LinkPartnerName::from("gw".to_owned()),
            LinkPartnerName::from("gw")
        );
        assert_eq!(
            LinkConfigName::from("cfg".to_owned()),
            LinkConfigName::from("cfg")
        );
        assert_eq!(
            TransportId::from("msg1_gw_1".to_owned()),
            TransportId::from("msg1_gw_1")
        );
    }

    #[test]
    fn test_lane_id_display() {
        let lane = LaneId::from("laneA");
        assert_eq!(format!("{}", lane), "laneA");
        assert_eq!(format!("{:?}", lane), "LaneId(laneA)");
    }
}
