//! Link partners and link configurations: the transport endpoints a lane
//! exchanges messages with.
//!
//! The connector core keeps only the configuration shape of a link. The
//! step machine addresses partners purely by name; loading the plugin
//! named by [`LinkConfiguration::link_impl`] and honoring `enabled`, the
//! link modes and the pull interval happens in the transport plugin
//! runtime that consumes these records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::lane::ConfigurationSource;
use crate::types::{LaneId, LinkConfigName, LinkPartnerName};

/// Default interval between pulls for pull-mode partners, in seconds.
pub const DEFAULT_PULL_INTERVAL_SECS: u64 = 300;

/// How messages move across a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkMode {
    /// The remote side initiates; the connector only reacts.
    Passive,
    /// The connector pushes outbound messages actively.
    Push,
    /// The connector polls the remote side on an interval.
    Pull,
}

impl LinkMode {
    pub const fn db_name(&self) -> &'static str {
        match self {
            LinkMode::Passive => "PASSIVE",
            LinkMode::Push => "PUSH",
            LinkMode::Pull => "PULL",
        }
    }

    pub fn from_db_name(name: &str) -> Option<Self> {
        match name {
            "PASSIVE" => Some(LinkMode::Passive),
            "PUSH" => Some(LinkMode::Push),
            "PULL" => Some(LinkMode::Pull),
            _ => None,
        }
    }
}

/// Which side of the connector a link partner sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    Gateway,
    Backend,
}

impl LinkType {
    pub const fn db_name(&self) -> &'static str {
        match self {
            LinkType::Gateway => "GATEWAY",
            LinkType::Backend => "BACKEND",
        }
    }

    pub fn from_db_name(name: &str) -> Option<Self> {
        match name {
            "GATEWAY" => Some(LinkType::Gateway),
            "BACKEND" => Some(LinkType::Backend),
            _ => None,
        }
    }
}

/// A shared transport configuration that several partners may reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfiguration {
    pub config_name: LinkConfigName,
    /// Name of the transport plugin implementing this configuration.
    pub link_impl: String,
    pub properties: BTreeMap<String, String>,
    pub configuration_source: ConfigurationSource,
}

impl LinkConfiguration {
    pub fn new(config_name: LinkConfigName, link_impl: impl Into<String>) -> Self {
        Self {
            config_name,
            link_impl: link_impl.into(),
            properties: BTreeMap::new(),
            configuration_source: ConfigurationSource::Db,
        }
    }
}

/// A remote endpoint a lane exchanges messages with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPartner {
    pub name: LinkPartnerName,
    pub lane_id: LaneId,
    pub link_type: LinkType,
    pub description: String,
    pub enabled: bool,
    pub send_link_mode: LinkMode,
    pub rcv_link_mode: LinkMode,
    /// Poll interval for pull-mode partners, in seconds.
    pub pull_interval_secs: u64,
    pub link_configuration: Option<LinkConfigName>,
    pub properties: BTreeMap<String, String>,
    pub configuration_source: ConfigurationSource,
}

impl LinkPartner {
    pub fn new(name: LinkPartnerName, lane_id: LaneId, link_type: LinkType) -> Self {
        Self {
            name,
            lane_id,
            link_type,
            description: String::new(),
            enabled: true,
            send_link_mode: LinkMode::Push,
            rcv_link_mode: LinkMode::Passive,
            pull_interval_secs: DEFAULT_PULL_INTERVAL_SECS,
            link_configuration: None,
            properties: BTreeMap::new(),
            configuration_source: ConfigurationSource::Db,
        }
    }
}
