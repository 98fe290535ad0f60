//! PMode configuration set lifecycle.
//!
//! At most one set per lane is active. Every change, including a single
//! catalog entry, activates a complete new set; the previous active set
//! is kept inactive for audit.

use std::sync::Arc;

use tracing::{debug, info};

use docbridge_core::{
    now_millis, Action, LaneId, PModeSet, Party, Service, ValidationError,
};
use docbridge_store::{KeystoreStore, PModeSetStore};

use crate::error::{ConfigError, Result};

/// Service managing the versioned PMode sets of all lanes.
pub struct PModeService<S> {
    store: Arc<S>,
}

impl<S> PModeService<S>
where
    S: PModeSetStore + KeystoreStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Activate `set` as the lane's configuration.
    ///
    /// The referenced connector trust store is resolved before anything
    /// is mutated; a dangling uuid leaves the lane untouched. The first
    /// set of a lane must name a trust store, later sets inherit the
    /// current one when they leave it unset.
    pub async fn update_configuration_set(&self, mut set: PModeSet) -> Result<PModeSet> {
        let store_uuid = set
            .connector_store
            .as_ref()
            .map(|r| r.uuid.clone())
            .filter(|u| !u.is_empty());

        if let Some(uuid) = &store_uuid {
            if self.store.find_keystore(uuid).await?.is_none() {
                return Err(ConfigError::NotFound(format!(
                    "connector store {} not found",
                    uuid
                )));
            }
        }

        let current = self.store.current_active_set(&set.lane_id).await?;
        if store_uuid.is_none() {
            match &current {
                None => return Err(ValidationError::MissingStoreUuid.into()),
                Some(current) => set.connector_store = current.connector_store.clone(),
            }
        }

        set.active = true;
        self.store.replace_active_set(&set).await?;
        info!(lane = %set.lane_id, "activated configuration set");
        Ok(set)
    }

    pub async fn current_set(&self, lane_id: &LaneId) -> Result<Option<PModeSet>> {
        Ok(self.store.current_active_set(lane_id).await?)
    }

    pub async fn inactive_sets(&self, lane_id: &LaneId) -> Result<Vec<PModeSet>> {
        Ok(self.store.inactive_sets(lane_id).await?)
    }

    /// Base for a single-entry catalog change: the current active set,
    /// or a fresh empty one if the lane has none yet.
    async fn current_or_new(&self, lane_id: &LaneId) -> Result<PModeSet> {
        let mut set = self
            .store
            .current_active_set(lane_id)
            .await?
            .unwrap_or_else(|| PModeSet::new_for_lane(lane_id.clone()));
        set.created = now_millis();
        Ok(set)
    }

    async fn activate_mutated(&self, set: PModeSet, description: String) -> Result<()> {
        let mut set = set;
        set.description = description;
        debug!(lane = %set.lane_id, description = %set.description, "catalog change");
        self.update_configuration_set(set).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Party catalog
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_party(&self, lane_id: &LaneId, party: Party) -> Result<()> {
        let mut set = self.current_or_new(lane_id).await?;
        let description = format!("added party {}", party.party_id);
        set.parties.push(party);
        self.activate_mutated(set, description).await
    }

    pub async fn update_party(&self, lane_id: &LaneId, old: &Party, new: Party) -> Result<()> {
        let mut set = self.current_or_new(lane_id).await?;
        let before = set.parties.len();
        set.parties.retain(|p| p != old);
        if set.parties.len() == before {
            return Err(ConfigError::NotFound(format!("party {}", old.party_id)));
        }
        let description = format!("updated party {}", new.party_id);
        set.parties.push(new);
        self.activate_mutated(set, description).await
    }

    pub async fn delete_party(&self, lane_id: &LaneId, party: &Party) -> Result<()> {
        let mut set = self.current_or_new(lane_id).await?;
        let before = set.parties.len();
        set.parties.retain(|p| p != party);
        if set.parties.len() == before {
            return Err(ConfigError::NotFound(format!("party {}", party.party_id)));
        }
        let description = format!("deleted party {}", party.party_id);
        self.activate_mutated(set, description).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Action catalog
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_action(&self, lane_id: &LaneId, action: Action) -> Result<()> {
        let mut set = self.current_or_new(lane_id).await?;
        let description = format!("added action {}", action.action);
        set.actions.push(action);
        self.activate_mutated(set, description).await
    }

    pub async fn update_action(&self, lane_id: &LaneId, old: &Action, new: Action) -> Result<()> {
        let mut set = self.current_or_new(lane_id).await?;
        let before = set.actions.len();
        set.actions.retain(|a| a != old);
        if set.actions.len() == before {
            return Err(ConfigError::NotFound(format!("action {}", old.action)));
        }
        let description = format!("updated action {}", new.action);
        set.actions.push(new);
        self.activate_mutated(set, description).await
    }

    pub async fn delete_action(&self, lane_id: &LaneId, action: &Action) -> Result<()> {
        let mut set = self.current_or_new(lane_id).await?;
        let before = set.actions.len();
        set.actions.retain(|a| a != action);
        if set.actions.len() == before {
            return Err(ConfigError::NotFound(format!("action {}", action.action)));
        }
        let description = format!("deleted action {}", action.action);
        self.activate_mutated(set, description).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Service catalog
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_service(&self, lane_id: &LaneId, service: Service) -> Result<()> {
        let mut set = self.current_or_new(lane_id).await?;
        let description = format!("added service {}", service.service);
        set.services.push(service);
        self.activate_mutated(set, description).await
    }

    pub async fn update_service(
        &self,
        lane_id: &LaneId,
        old: &Service,
        new: Service,
    ) -> Result<()> {
        let mut set = self.current_or_new(lane_id).await?;
        let before = set.services.len();
        set.services.retain(|s| s != old);
        if set.services.len() == before {
            return Err(ConfigError::NotFound(format!("service {}", old.service)));
        }
        let description = format!("updated service {}", new.service);
        set.services.push(new);
        self.activate_mutated(set, description).await
    }

    pub async fn delete_service(&self, lane_id: &LaneId, service: &Service) -> Result<()> {
        let mut set = self.current_or_new(lane_id).await?;
        let before = set.services.len();
        set.services.retain(|s| s != service);
        if set.services.len() == before {
            return Err(ConfigError::NotFound(format!("service {}", service.service)));
        }
        let description = format!("deleted service {}", service.service);
        self.activate_mutated(set, description).await
    }
}
