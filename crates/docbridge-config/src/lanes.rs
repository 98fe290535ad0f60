//! Lane registry: lookup and lifecycle of business domains.

use std::sync::Arc;

use tracing::info;

use docbridge_core::{BusinessDomain, LaneId};
use docbridge_store::{LaneStore, StoreError};

use crate::error::{ConfigError, Result};

/// Registry over the lane store.
///
/// The well-known default lane is bootstrapped on first access, so
/// callers can always rely on it existing.
pub struct LaneRegistry<S: LaneStore> {
    store: Arc<S>,
}

impl<S: LaneStore> LaneRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &LaneId) -> Result<Option<BusinessDomain>> {
        Ok(self.store.find_lane(id).await?)
    }

    /// The default lane, created if it does not exist yet. Idempotent.
    pub async fn get_default(&self) -> Result<BusinessDomain> {
        let id = LaneId::default_lane();
        if let Some(lane) = self.store.find_lane(&id).await? {
            return Ok(lane);
        }

        let lane = BusinessDomain::default_lane();
        match self.store.create_lane(&lane).await {
            Ok(()) => {
                info!(lane = %id, "bootstrapped default lane");
                Ok(lane)
            }
            // Lost the race against a concurrent bootstrap; use theirs.
            Err(StoreError::Duplicate(_)) => self
                .store
                .find_lane(&id)
                .await?
                .ok_or_else(|| ConfigError::NotFound(format!("lane {}", id))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self) -> Result<Vec<BusinessDomain>> {
        Ok(self.store.find_all_lanes().await?)
    }

    pub async fn create(&self, lane: &BusinessDomain) -> Result<()> {
        match self.store.create_lane(lane).await {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate(_)) => {
                Err(ConfigError::Conflict(format!("lane {} already exists", lane.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Update an existing lane. A missing lane is an error, never an
    /// implicit create.
    pub async fn update(&self, lane: &BusinessDomain) -> Result<()> {
        match self.store.update_lane(lane).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                Err(ConfigError::NotFound(format!("lane {}", lane.id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_store::MemoryStore;

    #[tokio::test]
    async fn test_default_lane_bootstrap_is_idempotent() {
        let registry = LaneRegistry::new(Arc::new(MemoryStore::new()));

        let first = registry.get_default().await.unwrap();
        let second = registry.get_default().await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_lane_is_not_found() {
        let registry = LaneRegistry::new(Arc::new(MemoryStore::new()));
        let lane = BusinessDomain::new(LaneId::from("ghost"));
        assert!(matches!(
            registry.update(&lane).await,
            Err(ConfigError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_then_update_properties() {
        let registry = LaneRegistry::new(Arc::new(MemoryStore::new()));
        let mut lane = BusinessDomain::new(LaneId::from("laneA"));
        registry.create(&lane).await.unwrap();

        lane.properties.insert("timeout".into(), "30".into());
        registry.update(&lane).await.unwrap();

        let loaded = registry.get(&lane.id).await.unwrap().unwrap();
        assert_eq!(loaded.properties.get("timeout").map(String::as_str), Some("30"));
    }
}
