//! Routing: selecting the link partner an outbound message goes to.

use std::sync::Arc;

use tracing::debug;

use docbridge_core::{LaneId, LinkPartnerName, MessageDetails, RoutingRule};
use docbridge_store::RoutingRuleStore;

use crate::error::Result;

/// Seam deciding whether a routing rule matches a message.
///
/// The rule's match clause is an opaque expression; interpreting it is
/// the evaluator's concern.
pub trait RoutingRuleEvaluator: Send + Sync {
    fn matches(&self, rule: &RoutingRule, details: &MessageDetails) -> bool;
}

impl<F> RoutingRuleEvaluator for F
where
    F: Fn(&RoutingRule, &MessageDetails) -> bool + Send + Sync,
{
    fn matches(&self, rule: &RoutingRule, details: &MessageDetails) -> bool {
        self(rule, details)
    }
}

/// Service resolving the link partner for outbound messages.
pub struct RoutingService<S: RoutingRuleStore> {
    store: Arc<S>,
    default_link: LinkPartnerName,
}

impl<S: RoutingRuleStore> RoutingService<S> {
    pub fn new(store: Arc<S>, default_link: LinkPartnerName) -> Self {
        Self {
            store,
            default_link,
        }
    }

    /// Pick the link partner for a message: the highest-priority matching
    /// rule of the lane wins, the configured default is the fallback.
    pub async fn resolve_link_partner(
        &self,
        lane_id: &LaneId,
        details: &MessageDetails,
        evaluator: &dyn RoutingRuleEvaluator,
    ) -> Result<LinkPartnerName> {
        // Rules come back ordered by priority, highest first.
        let rules = self.store.find_routing_rules(lane_id).await?;
        for rule in &rules {
            if evaluator.matches(rule, details) {
                debug!(lane = %lane_id, rule = %rule.rule_id, link = %rule.link_name, "routing rule matched");
                return Ok(rule.link_name.clone());
            }
        }
        debug!(lane = %lane_id, link = %self.default_link, "no routing rule matched, using default");
        Ok(self.default_link.clone())
    }

    pub async fn rules(&self, lane_id: &LaneId) -> Result<Vec<RoutingRule>> {
        Ok(self.store.find_routing_rules(lane_id).await?)
    }

    pub async fn upsert_rule(&self, rule: &RoutingRule) -> Result<()> {
        Ok(self.store.upsert_routing_rule(rule).await?)
    }

    pub async fn delete_rule(&self, lane_id: &LaneId, rule_id: &str) -> Result<()> {
        Ok(self.store.delete_routing_rule(lane_id, rule_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_core::{MessageDirection, RoutingRule};
    use docbridge_store::MemoryStore;

    fn rule(id: &str, link: &str, priority: i64, clause: &str) -> RoutingRule {
        let mut rule = RoutingRule::new(
            id,
            LaneId::from("lane1"),
            LinkPartnerName::from(link),
            clause,
        );
        rule.priority = priority;
        rule
    }

    /// Toy evaluator: a rule matches when its clause equals the
    /// message's action name.
    fn action_evaluator() -> impl RoutingRuleEvaluator {
        |rule: &RoutingRule, details: &MessageDetails| {
            details
                .action
                .as_ref()
                .map(|a| a.action == rule.match_clause)
                .unwrap_or(false)
        }
    }

    #[tokio::test]
    async fn test_highest_priority_match_wins() {
        let store = Arc::new(MemoryStore::new());
        let service = RoutingService::new(Arc::clone(&store), LinkPartnerName::from("default_gw"));
        let lane = LaneId::from("lane1");

        service.upsert_rule(&rule("low", "gw_low", 1, "Form_A")).await.unwrap();
        service.upsert_rule(&rule("high", "gw_high", 10, "Form_A")).await.unwrap();

        let mut details = MessageDetails::new(MessageDirection::BackendToGateway);
        details.action = Some(docbridge_core::Action::new("Form_A"));

        let link = service
            .resolve_link_partner(&lane, &details, &action_evaluator())
            .await
            .unwrap();
        assert_eq!(link, LinkPartnerName::from("gw_high"));
    }

    #[tokio::test]
    async fn test_no_match_falls_back_to_default() {
        let store = Arc::new(MemoryStore::new());
        let service = RoutingService::new(Arc::clone(&store), LinkPartnerName::from("default_gw"));

        service.upsert_rule(&rule("r1", "gw1", 1, "Form_A")).await.unwrap();
        let details = MessageDetails::new(MessageDirection::BackendToGateway);

        let link = service
            .resolve_link_partner(&LaneId::from("lane1"), &details, &action_evaluator())
            .await
            .unwrap();
        assert_eq!(link, LinkPartnerName::from("default_gw"));
    }
}
