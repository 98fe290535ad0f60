//! Routing rules: lane-scoped rules selecting the link partner for an
//! outbound message.

use serde::{Deserialize, Serialize};

use crate::lane::ConfigurationSource;
use crate::types::{LaneId, LinkPartnerName};

/// One routing rule of a lane.
///
/// Rules are evaluated highest priority first; the first matching rule's
/// link name wins. The match clause is an opaque expression interpreted
/// by the routing evaluator seam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub rule_id: String,
    pub lane_id: LaneId,
    pub link_name: LinkPartnerName,
    pub priority: i64,
    pub description: String,
    pub configuration_source: ConfigurationSource,
    pub match_clause: String,
}

impl RoutingRule {
    pub fn new(
        rule_id: impl Into<String>,
        lane_id: LaneId,
        link_name: LinkPartnerName,
        match_clause: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            lane_id,
            link_name,
            priority: 0,
            description: String::new(),
            configuration_source: ConfigurationSource::Db,
            match_clause: match_clause.into(),
        }
    }
}
