//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use docbridge_core::{
    BusinessDomain, Confirmation, ConfigurationSource, ConnectorMessageId, EvidenceId,
    EvidenceType, Keystore, KeystoreRef, KeystoreType, LaneId, LinkPartnerName, Message, PModeSet,
    Party, PartyRoleType, RoutingRule, Service, TransportId, TransportState, TransportStep,
    Action, StatusUpdate,
};

use crate::error::{Result, StoreError};
use crate::memory::last_attempt_steps_in_states;
use crate::migration;
use crate::traits::{
    EvidenceStore, KeystoreStore, LaneStore, MessageStore, PModeSetStore, RoutingRuleStore,
    TransportStepStore,
};

/// SQLite-based store implementing every store trait.
///
/// Thread-safe via an internal mutex. All operations run on the blocking
/// thread pool to keep the async runtime responsive.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn exec<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))?
    }
}

fn json_err(e: serde_json::Error) -> StoreError {
    StoreError::Serialization(e.to_string())
}

// ─────────────────────────────────────────────────────────────────────────
// Row loaders
// ─────────────────────────────────────────────────────────────────────────

fn load_related(conn: &Connection, message_id: &str) -> Result<Vec<Confirmation>> {
    let mut stmt = conn.prepare(
        "SELECT evidence_id, evidence_type, evidence, delivered_to_gateway, delivered_to_backend
         FROM evidences WHERE connector_message_id = ?1 ORDER BY evidence_id",
    )?;
    let rows = stmt.query_map(params![message_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<Vec<u8>>>(2)?,
            row.get::<_, Option<i64>>(3)?,
            row.get::<_, Option<i64>>(4)?,
        ))
    })?;

    let mut confirmations = Vec::new();
    for row in rows {
        let (id, type_name, evidence, to_gateway, to_backend) = row?;
        let evidence_type = EvidenceType::from_db_name(&type_name).ok_or_else(|| {
            StoreError::Serialization(format!("unknown evidence type: {}", type_name))
        })?;
        let mut confirmation = Confirmation::new(evidence_type, evidence.map(Bytes::from));
        confirmation.evidence_id = Some(EvidenceId(id));
        confirmation.delivered_to_gateway = to_gateway;
        confirmation.delivered_to_backend = to_backend;
        confirmations.push(confirmation);
    }
    Ok(confirmations)
}

fn load_message(conn: &Connection, message_id: &str) -> Result<Option<Message>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT message_json FROM messages WHERE connector_message_id = ?1",
            params![message_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(json) = json else {
        return Ok(None);
    };
    let mut message: Message = serde_json::from_str(&json).map_err(json_err)?;
    message.set_related_confirmations(load_related(conn, message_id)?);
    Ok(Some(message))
}

fn load_step(conn: &Connection, transport_id: &str) -> Result<Option<TransportStep>> {
    let row: Option<(String, String, u32, Option<String>, Option<String>, Option<String>, i64, Option<i64>)> =
        conn.query_row(
            "SELECT connector_message_id, link_partner_name, attempt, message_json,
                    remote_message_id, transport_system_message_id, created, final_state_reached
             FROM transport_steps WHERE transport_id = ?1",
            params![transport_id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            },
        )
        .optional()?;
    let Some((message_id, partner, attempt, message_json, remote_id, system_id, created, final_state)) =
        row
    else {
        return Ok(None);
    };

    let transported_message = match message_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(json_err)?),
        None => None,
    };

    let mut stmt = conn.prepare(
        "SELECT state, created, text FROM step_status WHERE transport_id = ?1",
    )?;
    let rows = stmt.query_map(params![transport_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;
    let mut status_updates = Vec::new();
    for row in rows {
        let (state_name, created, text) = row?;
        let transport_state = TransportState::from_db_name(&state_name).ok_or_else(|| {
            StoreError::Serialization(format!("unknown transport state: {}", state_name))
        })?;
        status_updates.push(StatusUpdate {
            transport_state,
            created,
            text,
        });
    }

    let mut step = TransportStep::from_parts(
        TransportId::new(transport_id),
        ConnectorMessageId::new(message_id),
        LinkPartnerName::new(partner),
        attempt,
        transported_message,
        created,
        final_state,
        status_updates,
    );
    step.remote_message_id = remote_id;
    step.transport_system_message_id = system_id;
    Ok(Some(step))
}

fn load_set_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, PModeSet)> {
    let set_id: i64 = row.get("set_id")?;
    let pmodes: Vec<u8> = row.get("pmodes")?;
    let store_uuid: Option<String> = row.get("connector_store_uuid")?;
    let set = PModeSet {
        lane_id: LaneId::new(row.get::<_, String>("lane_id")?),
        created: row.get("created")?,
        active: row.get("active")?,
        description: row.get("description")?,
        pmodes: Bytes::from(pmodes),
        connector_store: store_uuid.map(KeystoreRef::new),
        parties: Vec::new(),
        actions: Vec::new(),
        services: Vec::new(),
    };
    Ok((set_id, set))
}

fn load_set_catalogs(conn: &Connection, set_id: i64, set: &mut PModeSet) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT party_id, party_id_type, role, role_type FROM pmode_parties WHERE set_id = ?1",
    )?;
    let rows = stmt.query_map(params![set_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    for row in rows {
        let (party_id, party_id_type, role, role_type_name) = row?;
        let role_type = PartyRoleType::from_db_name(&role_type_name).ok_or_else(|| {
            StoreError::Serialization(format!("unknown party role type: {}", role_type_name))
        })?;
        set.parties.push(Party {
            party_id,
            party_id_type,
            role,
            role_type,
        });
    }

    let mut stmt = conn.prepare("SELECT action FROM pmode_actions WHERE set_id = ?1")?;
    let rows = stmt.query_map(params![set_id], |row| row.get::<_, String>(0))?;
    for row in rows {
        set.actions.push(Action::new(row?));
    }

    let mut stmt =
        conn.prepare("SELECT service, service_type FROM pmode_services WHERE set_id = ?1")?;
    let rows = stmt.query_map(params![set_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;
    for row in rows {
        let (service, service_type) = row?;
        set.services.push(Service {
            service,
            service_type,
        });
    }
    Ok(())
}

type LaneRow = (String, String, bool, String, String);

fn row_to_lane(row: &rusqlite::Row<'_>) -> rusqlite::Result<LaneRow> {
    Ok((
        row.get("lane_id")?,
        row.get("description")?,
        row.get("enabled")?,
        row.get("properties")?,
        row.get("configuration_source")?,
    ))
}

fn decode_lane(raw: LaneRow) -> Result<BusinessDomain> {
    let (lane_id, description, enabled, properties_json, source_name) = raw;
    let properties: BTreeMap<String, String> =
        serde_json::from_str(&properties_json).map_err(json_err)?;
    let configuration_source = ConfigurationSource::from_db_name(&source_name).ok_or_else(|| {
        StoreError::Serialization(format!("unknown configuration source: {}", source_name))
    })?;
    Ok(BusinessDomain {
        id: LaneId::new(lane_id),
        description,
        enabled,
        properties,
        configuration_source,
    })
}

// ─────────────────────────────────────────────────────────────────────────
// Trait implementations
// ─────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LaneStore for SqliteStore {
    async fn find_lane(&self, id: &LaneId) -> Result<Option<BusinessDomain>> {
        let id = id.clone();
        self.exec(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT lane_id, description, enabled, properties, configuration_source
                     FROM lanes WHERE lane_id = ?1",
                    params![id.as_str()],
                    row_to_lane,
                )
                .optional()?;
            raw.map(decode_lane).transpose()
        })
        .await
    }

    async fn find_all_lanes(&self) -> Result<Vec<BusinessDomain>> {
        self.exec(|conn| {
            let mut stmt = conn.prepare(
                "SELECT lane_id, description, enabled, properties, configuration_source
                 FROM lanes ORDER BY lane_id",
            )?;
            let rows = stmt.query_map([], row_to_lane)?;
            let mut lanes = Vec::new();
            for row in rows {
                lanes.push(decode_lane(row?)?);
            }
            Ok(lanes)
        })
        .await
    }

    async fn create_lane(&self, lane: &BusinessDomain) -> Result<()> {
        let lane = lane.clone();
        self.exec(move |conn| {
            let properties = serde_json::to_string(&lane.properties).map_err(json_err)?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO lanes
                 (lane_id, description, enabled, properties, configuration_source)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    lane.id.as_str(),
                    lane.description,
                    lane.enabled,
                    properties,
                    lane.configuration_source.db_name(),
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::Duplicate(format!("lane {}", lane.id)));
            }
            debug!(lane = %lane.id, "created lane");
            Ok(())
        })
        .await
    }

    async fn update_lane(&self, lane: &BusinessDomain) -> Result<()> {
        let lane = lane.clone();
        self.exec(move |conn| {
            let properties = serde_json::to_string(&lane.properties).map_err(json_err)?;
            let updated = conn.execute(
                "UPDATE lanes SET description = ?2, enabled = ?3, properties = ?4,
                        configuration_source = ?5
                 WHERE lane_id = ?1",
                params![
                    lane.id.as_str(),
                    lane.description,
                    lane.enabled,
                    properties,
                    lane.configuration_source.db_name(),
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("lane {}", lane.id)));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn persist_message(&self, message: &Message) -> Result<()> {
        let message = message.clone();
        self.exec(move |conn| {
            let json = serde_json::to_string(&message).map_err(json_err)?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO messages
                 (connector_message_id, lane_id, ebms_message_id, backend_message_id,
                  message_json, created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.connector_message_id().as_str(),
                    message.lane_id().as_str(),
                    message.details().ebms_message_id,
                    message.details().backend_message_id,
                    json,
                    docbridge_core::now_millis(),
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::Duplicate(format!(
                    "message {}",
                    message.connector_message_id()
                )));
            }
            debug!(message = %message.connector_message_id(), "persisted message");
            Ok(())
        })
        .await
    }

    async fn find_message(&self, id: &ConnectorMessageId) -> Result<Option<Message>> {
        let id = id.clone();
        self.exec(move |conn| load_message(conn, id.as_str())).await
    }

    async fn find_messages_by_ebms_id(&self, ebms_id: &str) -> Result<Vec<Message>> {
        let ebms_id = ebms_id.to_owned();
        self.exec(move |conn| {
            let ids: Vec<String> = conn
                .prepare(
                    "SELECT connector_message_id FROM messages WHERE ebms_message_id = ?1",
                )?
                .query_map(params![ebms_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut messages = Vec::new();
            for id in ids {
                if let Some(message) = load_message(conn, &id)? {
                    messages.push(message);
                }
            }
            Ok(messages)
        })
        .await
    }

    async fn update_message(&self, message: &Message) -> Result<()> {
        let message = message.clone();
        self.exec(move |conn| {
            let json = serde_json::to_string(&message).map_err(json_err)?;
            let updated = conn.execute(
                "UPDATE messages SET lane_id = ?2, ebms_message_id = ?3,
                        backend_message_id = ?4, message_json = ?5
                 WHERE connector_message_id = ?1",
                params![
                    message.connector_message_id().as_str(),
                    message.lane_id().as_str(),
                    message.details().ebms_message_id,
                    message.details().backend_message_id,
                    json,
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!(
                    "message {}",
                    message.connector_message_id()
                )));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl EvidenceStore for SqliteStore {
    async fn persist_evidence(
        &self,
        message_id: &ConnectorMessageId,
        confirmation: &Confirmation,
    ) -> Result<EvidenceId> {
        let message_id = message_id.clone();
        let confirmation = confirmation.clone();
        self.exec(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE connector_message_id = ?1)",
                params![message_id.as_str()],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(format!("message {}", message_id)));
            }
            conn.execute(
                "INSERT INTO evidences
                 (connector_message_id, evidence_type, evidence,
                  delivered_to_gateway, delivered_to_backend, created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message_id.as_str(),
                    confirmation.evidence_type.db_name(),
                    confirmation.evidence.as_ref().map(|b| b.as_ref()),
                    confirmation.delivered_to_gateway,
                    confirmation.delivered_to_backend,
                    docbridge_core::now_millis(),
                ],
            )?;
            Ok(EvidenceId(conn.last_insert_rowid()))
        })
        .await
    }

    async fn count_evidences_of_type(
        &self,
        message_id: &ConnectorMessageId,
        evidence_type: EvidenceType,
    ) -> Result<u32> {
        let message_id = message_id.clone();
        self.exec(move |conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM evidences
                 WHERE connector_message_id = ?1 AND evidence_type = ?2",
                params![message_id.as_str(), evidence_type.db_name()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    async fn find_evidences(&self, message_id: &ConnectorMessageId) -> Result<Vec<Confirmation>> {
        let message_id = message_id.clone();
        self.exec(move |conn| load_related(conn, message_id.as_str()))
            .await
    }

    async fn set_evidence_delivered_to_gateway(&self, id: EvidenceId, at: i64) -> Result<()> {
        self.exec(move |conn| {
            let updated = conn.execute(
                "UPDATE evidences SET delivered_to_gateway = ?2 WHERE evidence_id = ?1",
                params![id.0, at],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("evidence {}", id)));
            }
            Ok(())
        })
        .await
    }

    async fn set_evidence_delivered_to_backend(&self, id: EvidenceId, at: i64) -> Result<()> {
        self.exec(move |conn| {
            let updated = conn.execute(
                "UPDATE evidences SET delivered_to_backend = ?2 WHERE evidence_id = ?1",
                params![id.0, at],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("evidence {}", id)));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TransportStepStore for SqliteStore {
    async fn insert_step(&self, step: &TransportStep) -> Result<()> {
        let step = step.clone();
        self.exec(move |conn| {
            let message_json = step
                .transported_message()
                .map(serde_json::to_string)
                .transpose()
                .map_err(json_err)?;

            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO transport_steps
                 (connector_message_id, link_partner_name, attempt, transport_id,
                  message_json, remote_message_id, transport_system_message_id,
                  created, final_state_reached)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    step.connector_message_id().as_str(),
                    step.link_partner_name().as_str(),
                    step.attempt(),
                    step.transport_id().as_str(),
                    message_json,
                    step.remote_message_id,
                    step.transport_system_message_id,
                    step.created(),
                    step.final_state_reached(),
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::Duplicate(format!(
                    "transport step {}",
                    step.transport_id()
                )));
            }
            for update in step.status_updates() {
                tx.execute(
                    "INSERT INTO step_status (transport_id, state, created, text)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        step.transport_id().as_str(),
                        update.transport_state.db_name(),
                        update.created,
                        update.text,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn save_step(&self, step: &TransportStep) -> Result<()> {
        let step = step.clone();
        self.exec(move |conn| {
            let message_json = step
                .transported_message()
                .map(serde_json::to_string)
                .transpose()
                .map_err(json_err)?;

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO transport_steps
                 (connector_message_id, link_partner_name, attempt, transport_id,
                  message_json, remote_message_id, transport_system_message_id,
                  created, final_state_reached)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(connector_message_id, link_partner_name, attempt) DO UPDATE SET
                    message_json = excluded.message_json,
                    remote_message_id = excluded.remote_message_id,
                    transport_system_message_id = excluded.transport_system_message_id,
                    final_state_reached = excluded.final_state_reached",
                params![
                    step.connector_message_id().as_str(),
                    step.link_partner_name().as_str(),
                    step.attempt(),
                    step.transport_id().as_str(),
                    message_json,
                    step.remote_message_id,
                    step.transport_system_message_id,
                    step.created(),
                    step.final_state_reached(),
                ],
            )?;

            // Replace the status history wholesale
            tx.execute(
                "DELETE FROM step_status WHERE transport_id = ?1",
                params![step.transport_id().as_str()],
            )?;
            for update in step.status_updates() {
                tx.execute(
                    "INSERT INTO step_status (transport_id, state, created, text)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        step.transport_id().as_str(),
                        update.transport_state.db_name(),
                        update.created,
                        update.text,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn find_step(&self, transport_id: &TransportId) -> Result<Option<TransportStep>> {
        let transport_id = transport_id.clone();
        self.exec(move |conn| load_step(conn, transport_id.as_str()))
            .await
    }

    async fn highest_attempt(
        &self,
        message_id: &ConnectorMessageId,
        partner: &LinkPartnerName,
    ) -> Result<u32> {
        let message_id = message_id.clone();
        let partner = partner.clone();
        self.exec(move |conn| {
            let attempt: u32 = conn.query_row(
                "SELECT COALESCE(MAX(attempt), 0) FROM transport_steps
                 WHERE connector_message_id = ?1 AND link_partner_name = ?2",
                params![message_id.as_str(), partner.as_str()],
                |row| row.get(0),
            )?;
            Ok(attempt)
        })
        .await
    }

    async fn find_steps_by_message(
        &self,
        message_id: &ConnectorMessageId,
    ) -> Result<Vec<TransportStep>> {
        let message_id = message_id.clone();
        self.exec(move |conn| {
            let ids: Vec<String> = conn
                .prepare(
                    "SELECT transport_id FROM transport_steps
                     WHERE connector_message_id = ?1
                     ORDER BY link_partner_name, attempt",
                )?
                .query_map(params![message_id.as_str()], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut steps = Vec::new();
            for id in ids {
                if let Some(step) = load_step(conn, &id)? {
                    steps.push(step);
                }
            }
            Ok(steps)
        })
        .await
    }

    async fn find_last_attempt_steps_in_states(
        &self,
        states: &[TransportState],
        partners: &[LinkPartnerName],
    ) -> Result<Vec<TransportStep>> {
        if partners.is_empty() || states.is_empty() {
            return Ok(Vec::new());
        }
        let states = states.to_vec();
        let partners = partners.to_vec();
        self.exec(move |conn| {
            let placeholders = vec!["?"; partners.len()].join(", ");
            let sql = format!(
                "SELECT transport_id FROM transport_steps WHERE link_partner_name IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids: Vec<String> = stmt
                .query_map(
                    rusqlite::params_from_iter(partners.iter().map(|p| p.as_str())),
                    |row| row.get(0),
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            // Head-of-history and last-attempt selection happen on the
            // hydrated steps, keeping the SQL simple.
            let mut steps = Vec::new();
            for id in ids {
                if let Some(step) = load_step(conn, &id)? {
                    steps.push(step);
                }
            }
            Ok(last_attempt_steps_in_states(steps.iter(), &states, &partners))
        })
        .await
    }

    async fn all_link_partner_names(&self) -> Result<Vec<LinkPartnerName>> {
        self.exec(|conn| {
            let names: Vec<String> = conn
                .prepare(
                    "SELECT DISTINCT link_partner_name FROM transport_steps
                     ORDER BY link_partner_name",
                )?
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names.into_iter().map(LinkPartnerName::new).collect())
        })
        .await
    }
}

#[async_trait]
impl PModeSetStore for SqliteStore {
    async fn current_active_set(&self, lane_id: &LaneId) -> Result<Option<PModeSet>> {
        let lane_id = lane_id.clone();
        self.exec(move |conn| {
            let row = conn
                .query_row(
                    "SELECT set_id, lane_id, created, active, description, pmodes,
                            connector_store_uuid
                     FROM pmode_sets WHERE lane_id = ?1 AND active = 1",
                    params![lane_id.as_str()],
                    load_set_row,
                )
                .optional()?;
            let Some((set_id, mut set)) = row else {
                return Ok(None);
            };
            load_set_catalogs(conn, set_id, &mut set)?;
            Ok(Some(set))
        })
        .await
    }

    async fn inactive_sets(&self, lane_id: &LaneId) -> Result<Vec<PModeSet>> {
        let lane_id = lane_id.clone();
        self.exec(move |conn| {
            let rows: Vec<(i64, PModeSet)> = conn
                .prepare(
                    "SELECT set_id, lane_id, created, active, description, pmodes,
                            connector_store_uuid
                     FROM pmode_sets WHERE lane_id = ?1 AND active = 0
                     ORDER BY created DESC",
                )?
                .query_map(params![lane_id.as_str()], load_set_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut sets = Vec::new();
            for (set_id, mut set) in rows {
                load_set_catalogs(conn, set_id, &mut set)?;
                sets.push(set);
            }
            Ok(sets)
        })
        .await
    }

    async fn replace_active_set(&self, set: &PModeSet) -> Result<()> {
        let set = set.clone();
        self.exec(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE pmode_sets SET active = 0 WHERE lane_id = ?1 AND active = 1",
                params![set.lane_id.as_str()],
            )?;
            tx.execute(
                "INSERT INTO pmode_sets
                 (lane_id, created, active, description, pmodes, connector_store_uuid)
                 VALUES (?1, ?2, 1, ?3, ?4, ?5)",
                params![
                    set.lane_id.as_str(),
                    set.created,
                    set.description,
                    set.pmodes.as_ref(),
                    set.connector_store.as_ref().map(|s| s.uuid.as_str()),
                ],
            )?;
            let set_id = tx.last_insert_rowid();

            for party in &set.parties {
                tx.execute(
                    "INSERT INTO pmode_parties (set_id, party_id, party_id_type, role, role_type)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        set_id,
                        party.party_id,
                        party.party_id_type,
                        party.role,
                        party.role_type.db_name(),
                    ],
                )?;
            }
            for action in &set.actions {
                tx.execute(
                    "INSERT INTO pmode_actions (set_id, action) VALUES (?1, ?2)",
                    params![set_id, action.action],
                )?;
            }
            for service in &set.services {
                tx.execute(
                    "INSERT INTO pmode_services (set_id, service, service_type)
                     VALUES (?1, ?2, ?3)",
                    params![set_id, service.service, service.service_type],
                )?;
            }
            tx.commit()?;
            debug!(lane = %set.lane_id, "activated new pmode set");
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl KeystoreStore for SqliteStore {
    async fn persist_keystore(&self, keystore: &Keystore) -> Result<()> {
        let keystore = keystore.clone();
        self.exec(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO keystores
                 (uuid, bytes, password, keystore_type, description, uploaded)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    keystore.uuid,
                    keystore.bytes.as_ref(),
                    keystore.password,
                    keystore.keystore_type.db_name(),
                    keystore.description,
                    keystore.uploaded,
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::Duplicate(format!("keystore {}", keystore.uuid)));
            }
            Ok(())
        })
        .await
    }

    async fn find_keystore(&self, uuid: &str) -> Result<Option<Keystore>> {
        let uuid = uuid.to_owned();
        self.exec(move |conn| {
            let row: Option<(Vec<u8>, String, String, Option<String>, i64)> = conn
                .query_row(
                    "SELECT bytes, password, keystore_type, description, uploaded
                     FROM keystores WHERE uuid = ?1",
                    params![uuid],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    },
                )
                .optional()?;
            let Some((bytes, password, type_name, description, uploaded)) = row else {
                return Ok(None);
            };
            let keystore_type = KeystoreType::from_db_name(&type_name).ok_or_else(|| {
                StoreError::Serialization(format!("unknown keystore type: {}", type_name))
            })?;
            let mut keystore = Keystore::new(uuid, Bytes::from(bytes), password, keystore_type);
            keystore.description = description;
            keystore.uploaded = uploaded;
            Ok(Some(keystore))
        })
        .await
    }

    async fn update_keystore_password(&self, uuid: &str, password: &str) -> Result<()> {
        let uuid = uuid.to_owned();
        let password = password.to_owned();
        self.exec(move |conn| {
            let updated = conn.execute(
                "UPDATE keystores SET password = ?2 WHERE uuid = ?1",
                params![uuid, password],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("keystore {}", uuid)));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RoutingRuleStore for SqliteStore {
    async fn find_routing_rules(&self, lane_id: &LaneId) -> Result<Vec<RoutingRule>> {
        let lane_id = lane_id.clone();
        self.exec(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT rule_id, link_name, priority, description, configuration_source,
                        match_clause
                 FROM routing_rules WHERE lane_id = ?1 ORDER BY priority DESC",
            )?;
            let rows = stmt.query_map(params![lane_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?;
            let mut rules = Vec::new();
            for row in rows {
                let (rule_id, link_name, priority, description, source_name, match_clause) = row?;
                let configuration_source = ConfigurationSource::from_db_name(&source_name)
                    .ok_or_else(|| {
                        StoreError::Serialization(format!(
                            "unknown configuration source: {}",
                            source_name
                        ))
                    })?;
                rules.push(RoutingRule {
                    rule_id,
                    lane_id: lane_id.clone(),
                    link_name: LinkPartnerName::new(link_name),
                    priority,
                    description,
                    configuration_source,
                    match_clause,
                });
            }
            Ok(rules)
        })
        .await
    }

    async fn upsert_routing_rule(&self, rule: &RoutingRule) -> Result<()> {
        let rule = rule.clone();
        self.exec(move |conn| {
            conn.execute(
                "INSERT INTO routing_rules
                 (lane_id, rule_id, link_name, priority, description,
                  configuration_source, match_clause)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(lane_id, rule_id) DO UPDATE SET
                    link_name = excluded.link_name,
                    priority = excluded.priority,
                    description = excluded.description,
                    configuration_source = excluded.configuration_source,
                    match_clause = excluded.match_clause",
                params![
                    rule.lane_id.as_str(),
                    rule.rule_id,
                    rule.link_name.as_str(),
                    rule.priority,
                    rule.description,
                    rule.configuration_source.db_name(),
                    rule.match_clause,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_routing_rule(&self, lane_id: &LaneId, rule_id: &str) -> Result<()> {
        let lane_id = lane_id.clone();
        let rule_id = rule_id.to_owned();
        self.exec(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM routing_rules WHERE lane_id = ?1 AND rule_id = ?2",
                params![lane_id.as_str(), rule_id],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound(format!("routing rule {}", rule_id)));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_core::{MessageContent, MessageDetails, MessageDirection};

    fn message(id: &str) -> Message {
        Message::business_with_id(
            ConnectorMessageId::from(id),
            MessageDetails::new(MessageDirection::BackendToGateway),
            MessageContent::new(Bytes::from_static(b"<x/>")),
        )
    }

    #[tokio::test]
    async fn test_message_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let msg = message("id1");
        store.persist_message(&msg).await.unwrap();

        let loaded = store
            .find_message(&ConnectorMessageId::from("id1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.connector_message_id(), msg.connector_message_id());
        assert!(loaded.content().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_message_rejected() {
        let store = SqliteStore::open_memory().unwrap();
        store.persist_message(&message("id1")).await.unwrap();
        let err = store.persist_message(&message("id1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_evidence_hydrates_into_message() {
        let store = SqliteStore::open_memory().unwrap();
        store.persist_message(&message("id1")).await.unwrap();

        let conf = Confirmation::new(EvidenceType::Delivery, Some(Bytes::from_static(b"<e/>")));
        let id = store
            .persist_evidence(&ConnectorMessageId::from("id1"), &conf)
            .await
            .unwrap();
        store
            .set_evidence_delivered_to_gateway(id, 1234)
            .await
            .unwrap();

        let loaded = store
            .find_message(&ConnectorMessageId::from("id1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.related_confirmations().len(), 1);
        let related = &loaded.related_confirmations()[0];
        assert_eq!(related.evidence_id, Some(id));
        assert_eq!(related.delivered_to_gateway, Some(1234));
    }

    #[tokio::test]
    async fn test_step_roundtrip_with_history() {
        let store = SqliteStore::open_memory().unwrap();
        let mut step = TransportStep::new(
            ConnectorMessageId::from("id1"),
            LinkPartnerName::from("gw"),
            1,
        )
        .unwrap();
        step.add_transport_status_at(TransportState::Pending, 10, None)
            .unwrap();
        step.add_transport_status_at(TransportState::Accepted, 20, Some("ok".into()))
            .unwrap();
        store.save_step(&step).await.unwrap();

        let loaded = store
            .find_step(&TransportId::from("id1_gw_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.attempt(), 1);
        assert_eq!(loaded.status_updates().len(), 2);
        assert!(loaded.is_in_accepted_state());
    }

    #[tokio::test]
    async fn test_save_step_is_upsert() {
        let store = SqliteStore::open_memory().unwrap();
        let mut step = TransportStep::new(
            ConnectorMessageId::from("id1"),
            LinkPartnerName::from("gw"),
            1,
        )
        .unwrap();
        step.add_transport_status_at(TransportState::Pending, 10, None)
            .unwrap();
        store.save_step(&step).await.unwrap();

        step.add_transport_status_at(TransportState::Failed, 20, None)
            .unwrap();
        store.save_step(&step).await.unwrap();

        let loaded = store
            .find_step(&TransportId::from("id1_gw_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status_updates().len(), 2);
        assert_eq!(loaded.final_state_reached(), Some(20));
    }

    #[tokio::test]
    async fn test_insert_step_rejects_taken_attempt() {
        let store = SqliteStore::open_memory().unwrap();
        let mut step = TransportStep::new(
            ConnectorMessageId::from("id1"),
            LinkPartnerName::from("gw"),
            1,
        )
        .unwrap();
        step.add_transport_status_at(TransportState::Pending, 10, None)
            .unwrap();
        store.insert_step(&step).await.unwrap();

        // A competing insert of the same attempt neither replaces the
        // stored step nor touches its history.
        let other = TransportStep::new(
            ConnectorMessageId::from("id1"),
            LinkPartnerName::from("gw"),
            1,
        )
        .unwrap();
        let err = store.insert_step(&other).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let loaded = store
            .find_step(&TransportId::from("id1_gw_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status_updates().len(), 1);
        assert!(loaded.is_in_pending_state());
    }

    #[tokio::test]
    async fn test_highest_attempt() {
        let store = SqliteStore::open_memory().unwrap();
        let msg = ConnectorMessageId::from("id1");
        let partner = LinkPartnerName::from("gw");
        assert_eq!(store.highest_attempt(&msg, &partner).await.unwrap(), 0);

        for attempt in 1..=3 {
            let step = TransportStep::new(msg.clone(), partner.clone(), attempt).unwrap();
            store.save_step(&step).await.unwrap();
        }
        assert_eq!(store.highest_attempt(&msg, &partner).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_pmode_set_replacement() {
        let store = SqliteStore::open_memory().unwrap();
        let lane = LaneId::from("lane1");

        let mut first = PModeSet::new_for_lane(lane.clone());
        first.parties.push(Party::new("A", PartyRoleType::Initiator));
        first.actions.push(Action::new("Form_A"));
        first.services.push(Service::new("EPO"));
        store.replace_active_set(&first).await.unwrap();

        let mut second = PModeSet::new_for_lane(lane.clone());
        second.created = first.created + 1;
        store.replace_active_set(&second).await.unwrap();

        let active = store.current_active_set(&lane).await.unwrap().unwrap();
        assert_eq!(active.created, second.created);
        assert!(active.parties.is_empty());

        let inactive = store.inactive_sets(&lane).await.unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].parties.len(), 1);
        assert_eq!(inactive[0].actions[0].action, "Form_A");
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docbridge.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.persist_message(&message("id1")).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store
            .find_message(&ConnectorMessageId::from("id1"))
            .await
            .unwrap()
            .is_some());
    }
}
