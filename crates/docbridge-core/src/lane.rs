//! Business domains (lanes): isolated multi-tenant configuration scopes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::LaneId;

/// Id of the well-known default lane, created on first access if absent.
pub const DEFAULT_LANE_ID: &str = "defaultMessageLane";

/// Where a piece of configuration was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationSource {
    /// Stored in the connector database, mutable at runtime.
    Db,
    /// Loaded from static environment/file configuration, read-only.
    Env,
}

impl ConfigurationSource {
    pub const fn db_name(&self) -> &'static str {
        match self {
            ConfigurationSource::Db => "DB",
            ConfigurationSource::Env => "ENV",
        }
    }

    pub fn from_db_name(name: &str) -> Option<Self> {
        match name {
            "DB" => Some(ConfigurationSource::Db),
            "ENV" => Some(ConfigurationSource::Env),
            _ => None,
        }
    }
}

/// An isolated configuration scope (tenant). Every message, PMode set and
/// link partner belongs to exactly one lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDomain {
    pub id: LaneId,
    pub description: String,
    pub enabled: bool,
    /// Arbitrary lane-scoped configuration properties. Updates replace the
    /// whole map; callers read-modify-write.
    pub properties: BTreeMap<String, String>,
    pub configuration_source: ConfigurationSource,
}

impl BusinessDomain {
    pub fn new(id: LaneId) -> Self {
        Self {
            id,
            description: String::new(),
            enabled: true,
            properties: BTreeMap::new(),
            configuration_source: ConfigurationSource::Db,
        }
    }

    /// The well-known default lane, with empty properties.
    pub fn default_lane() -> Self {
        let mut lane = Self::new(LaneId::new(DEFAULT_LANE_ID));
        lane.description = "default message lane".to_owned();
        lane
    }

    pub fn is_default_lane(&self) -> bool {
        self.id.as_str() == DEFAULT_LANE_ID
    }
}

impl LaneId {
    /// The id of the well-known default lane.
    pub fn default_lane() -> Self {
        LaneId::new(DEFAULT_LANE_ID)
    }
}
