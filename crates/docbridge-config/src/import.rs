//! PMode document import.
//!
//! Parsing the uploaded PMode document is a collaborator concern behind
//! [`PModeImportParser`]; this module turns a parsed result into an
//! activated configuration set.

use bytes::Bytes;
use tracing::debug;

use docbridge_core::{KeystoreRef, LaneId, PModeSet, Party, ValidationError};
use docbridge_store::{KeystoreStore, PModeSetStore};

use crate::error::{ConfigError, Result};
use crate::pmode::PModeService;

/// Catalogs extracted from an uploaded PMode document.
#[derive(Debug, Clone, Default)]
pub struct ImportedPModes {
    pub parties: Vec<Party>,
    pub actions: Vec<docbridge_core::Action>,
    pub services: Vec<docbridge_core::Service>,
    /// Party id of the party operating this connector, if declared.
    pub home_party_name: Option<String>,
}

/// Parser seam for the uploaded PMode document format.
pub trait PModeImportParser: Send + Sync {
    fn parse(&self, pmodes: &Bytes) -> std::result::Result<ImportedPModes, String>;
}

impl<S> PModeService<S>
where
    S: PModeSetStore + KeystoreStore,
{
    /// Parse an uploaded PMode document and activate it as the lane's
    /// configuration set.
    pub async fn import_pmodes(
        &self,
        lane_id: &LaneId,
        pmodes: Bytes,
        description: impl Into<String>,
        connector_store: Option<KeystoreRef>,
        parser: &dyn PModeImportParser,
    ) -> Result<PModeSet> {
        let imported = parser
            .parse(&pmodes)
            .map_err(|e| ConfigError::Validation(ValidationError::Invalid(e)))?;

        if let Some(home) = &imported.home_party_name {
            if !imported.parties.iter().any(|p| &p.party_id == home) {
                return Err(ValidationError::Invalid(format!(
                    "home party {} is not among the imported parties",
                    home
                ))
                .into());
            }
        }
        debug!(
            lane = %lane_id,
            parties = imported.parties.len(),
            actions = imported.actions.len(),
            services = imported.services.len(),
            "parsed pmode document"
        );

        let mut set = PModeSet::new_for_lane(lane_id.clone());
        set.description = description.into();
        set.pmodes = pmodes;
        set.connector_store = connector_store;
        set.parties = imported.parties;
        set.actions = imported.actions;
        set.services = imported.services;

        self.update_configuration_set(set).await
    }
}
