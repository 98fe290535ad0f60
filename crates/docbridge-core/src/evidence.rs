//! Evidence records: non-repudiation confirmations attesting the outcome
//! of a business message's transmission.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::EvidenceId;

/// The kind of an evidence record.
///
/// Each kind carries a maximum occurrence count per business message
/// (the ETSI-REM max-occurrence variable); 0 means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceType {
    SubmissionAcceptance,
    SubmissionRejection,
    RelayRemmdAcceptance,
    RelayRemmdRejection,
    RelayRemmdFailure,
    Delivery,
    NonDelivery,
    Retrieval,
    NonRetrieval,
}

/// Static metadata table: variant -> (db name, max occurrence).
const EVIDENCE_TYPE_TABLE: &[(EvidenceType, &str, u32)] = &[
    (EvidenceType::SubmissionAcceptance, "SUBMISSION_ACCEPTANCE", 1),
    (EvidenceType::SubmissionRejection, "SUBMISSION_REJECTION", 1),
    (EvidenceType::RelayRemmdAcceptance, "RELAY_REMMD_ACCEPTANCE", 2),
    (EvidenceType::RelayRemmdRejection, "RELAY_REMMD_REJECTION", 2),
    (EvidenceType::RelayRemmdFailure, "RELAY_REMMD_FAILURE", 2),
    (EvidenceType::Delivery, "DELIVERY", 1),
    (EvidenceType::NonDelivery, "NON_DELIVERY", 1),
    (EvidenceType::Retrieval, "RETRIEVAL", 1),
    (EvidenceType::NonRetrieval, "NON_RETRIEVAL", 1),
];

impl EvidenceType {
    pub fn db_name(&self) -> &'static str {
        EVIDENCE_TYPE_TABLE
            .iter()
            .find(|(t, _, _)| t == self)
            .map(|(_, name, _)| *name)
            .expect("every variant is in the table")
    }

    pub fn from_db_name(name: &str) -> Option<Self> {
        EVIDENCE_TYPE_TABLE
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(t, _, _)| *t)
    }

    /// How many evidences of this type one business message may carry.
    /// 0 means unlimited.
    pub fn max_occurrence(&self) -> u32 {
        EVIDENCE_TYPE_TABLE
            .iter()
            .find(|(t, _, _)| t == self)
            .map(|(_, _, max)| *max)
            .expect("every variant is in the table")
    }

    /// Negative evidences report a failed transmission outcome.
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            EvidenceType::SubmissionRejection
                | EvidenceType::RelayRemmdRejection
                | EvidenceType::RelayRemmdFailure
                | EvidenceType::NonDelivery
                | EvidenceType::NonRetrieval
        )
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.db_name())
    }
}

/// A confirmation: one evidence record about a business message.
///
/// The raw evidence bytes may be absent (e.g. a "delivery pending"
/// placeholder). `evidence_id` is assigned by the persistence layer; two
/// persisted confirmations are the same evidence iff their ids match.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub evidence_type: EvidenceType,
    pub evidence: Option<Bytes>,
    pub evidence_id: Option<EvidenceId>,
    pub delivered_to_gateway: Option<i64>,
    pub delivered_to_backend: Option<i64>,
}

impl Confirmation {
    pub fn new(evidence_type: EvidenceType, evidence: Option<Bytes>) -> Self {
        Self {
            evidence_type,
            evidence,
            evidence_id: None,
            delivered_to_gateway: None,
            delivered_to_backend: None,
        }
    }

    /// Whether `other` carries byte-identical evidence of the same type.
    ///
    /// This is the content-based comparison used by the message
    /// aggregate's transported-confirmation dedup; it deliberately ignores
    /// the assigned evidence id.
    pub fn same_evidence_content(&self, other: &Confirmation) -> bool {
        self.evidence_type == other.evidence_type && self.evidence == other.evidence
    }
}

impl fmt::Debug for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self
            .evidence
            .as_ref()
            .map(|b| hex::encode(&b[..b.len().min(8)]))
            .unwrap_or_else(|| "<none>".to_owned());
        f.debug_struct("Confirmation")
            .field("evidence_type", &self.evidence_type)
            .field("evidence", &prefix)
            .field("evidence_id", &self.evidence_id)
            .finish()
    }
}
