//! Proptest generators for property-based testing.

use proptest::prelude::*;

use bytes::Bytes;
use docbridge_core::{
    Confirmation, ConnectorMessageId, EvidenceType, LaneId, LinkPartnerName, TransportState,
    TransportStep,
};

/// Generate a connector message id.
pub fn connector_message_id() -> impl Strategy<Value = ConnectorMessageId> {
    "[a-z0-9]{4,24}".prop_map(ConnectorMessageId::from)
}

/// Generate a lane id.
pub fn lane_id() -> impl Strategy<Value = LaneId> {
    "[a-z][a-z0-9-]{0,31}".prop_map(LaneId::from)
}

/// Generate a non-empty link partner name.
pub fn link_partner_name() -> impl Strategy<Value = LinkPartnerName> {
    "[a-z][a-z0-9_]{0,15}".prop_map(LinkPartnerName::from)
}

/// Generate a valid attempt number (1-indexed).
pub fn attempt() -> impl Strategy<Value = u32> {
    1u32..=1000u32
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Generate an EvidenceType.
pub fn evidence_type() -> impl Strategy<Value = EvidenceType> {
    prop_oneof![
        Just(EvidenceType::SubmissionAcceptance),
        Just(EvidenceType::SubmissionRejection),
        Just(EvidenceType::RelayRemmdAcceptance),
        Just(EvidenceType::RelayRemmdRejection),
        Just(EvidenceType::RelayRemmdFailure),
        Just(EvidenceType::Delivery),
        Just(EvidenceType::NonDelivery),
        Just(EvidenceType::Retrieval),
        Just(EvidenceType::NonRetrieval),
    ]
}

/// Generate a TransportState.
pub fn transport_state() -> impl Strategy<Value = TransportState> {
    prop_oneof![
        Just(TransportState::Pending),
        Just(TransportState::PendingDownloaded),
        Just(TransportState::Accepted),
        Just(TransportState::Failed),
        Just(TransportState::Delivered),
    ]
}

/// Generate a confirmation with optional evidence bytes.
pub fn confirmation(max_len: usize) -> impl Strategy<Value = Confirmation> {
    (
        evidence_type(),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..=max_len)),
    )
        .prop_map(|(ty, bytes)| Confirmation::new(ty, bytes.map(Bytes::from)))
}

/// Parameters for generating a transport step.
#[derive(Debug, Clone)]
pub struct StepParams {
    pub message_id: ConnectorMessageId,
    pub partner: LinkPartnerName,
    pub attempt: u32,
}

impl Arbitrary for StepParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (connector_message_id(), link_partner_name(), attempt())
            .prop_map(|(message_id, partner, attempt)| StepParams {
                message_id,
                partner,
                attempt,
            })
            .boxed()
    }
}

/// Generate a transport step from parameters.
pub fn step_from_params(params: &StepParams) -> TransportStep {
    TransportStep::new(
        params.message_id.clone(),
        params.partner.clone(),
        params.attempt,
    )
    .expect("generated coordinates are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_transport_id_deterministic(params: StepParams) {
            let s1 = step_from_params(&params);
            let s2 = step_from_params(&params);
            prop_assert_eq!(s1.transport_id(), s2.transport_id());
        }

        #[test]
        fn test_transport_id_embeds_coordinates(params: StepParams) {
            let step = step_from_params(&params);
            let expected = format!(
                "{}_{}_{}",
                params.message_id, params.partner, params.attempt
            );
            prop_assert_eq!(step.transport_id().as_str(), expected.as_str());
        }

        /// Whatever order updates arrive in, the head priority only ever
        /// climbs: accepted updates are exactly those outranking the head.
        #[test]
        fn test_head_priority_never_decreases(
            params: StepParams,
            states in prop::collection::vec(transport_state(), 1..20),
        ) {
            let mut step = step_from_params(&params);
            let mut best: Option<i32> = None;
            for (i, state) in states.into_iter().enumerate() {
                match step.add_transport_status_at(state, i as i64 + 1, None) {
                    Ok(()) => {
                        prop_assert!(best.map(|b| state.priority() > b).unwrap_or(true));
                        best = Some(state.priority());
                    }
                    Err(_) => {
                        prop_assert!(best.map(|b| state.priority() <= b).unwrap_or(false));
                    }
                }
                if let Some(best) = best {
                    prop_assert_eq!(
                        step.head().map(|u| u.transport_state.priority()),
                        Some(best)
                    );
                }
            }
        }

        #[test]
        fn test_confirmation_content_equality_is_symmetric(
            a in confirmation(64),
            b in confirmation(64),
        ) {
            prop_assert_eq!(a.same_evidence_content(&b), b.same_evidence_content(&a));
        }
    }
}
