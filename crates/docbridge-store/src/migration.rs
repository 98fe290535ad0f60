//! Database schema migrations for SQLite.
//!
//! Simple versioned migration system. Each migration transforms the
//! schema from version N to N+1 and is applied inside one transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, docbridge_core::now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Business domains (lanes)
        CREATE TABLE lanes (
            lane_id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            enabled INTEGER NOT NULL,
            properties TEXT NOT NULL,             -- JSON object of lane properties
            configuration_source TEXT NOT NULL
        );

        -- Message aggregates, stored as one JSON snapshot each.
        -- Related confirmations are NOT in the snapshot; they are
        -- rebuilt from the evidences table on load.
        CREATE TABLE messages (
            connector_message_id TEXT PRIMARY KEY,
            lane_id TEXT NOT NULL,
            ebms_message_id TEXT,
            backend_message_id TEXT,
            message_json TEXT NOT NULL,
            created INTEGER NOT NULL
        );

        -- Evidence records about business messages
        CREATE TABLE evidences (
            evidence_id INTEGER PRIMARY KEY AUTOINCREMENT,
            connector_message_id TEXT NOT NULL,
            evidence_type TEXT NOT NULL,
            evidence BLOB,
            delivered_to_gateway INTEGER,
            delivered_to_backend INTEGER,
            created INTEGER NOT NULL
        );

        -- One delivery attempt of one message over one link partner
        CREATE TABLE transport_steps (
            connector_message_id TEXT NOT NULL,
            link_partner_name TEXT NOT NULL,
            attempt INTEGER NOT NULL,
            transport_id TEXT NOT NULL UNIQUE,
            message_json TEXT,                    -- transported message snapshot
            remote_message_id TEXT,
            transport_system_message_id TEXT,
            created INTEGER NOT NULL,
            final_state_reached INTEGER,
            PRIMARY KEY (connector_message_id, link_partner_name, attempt)
        );

        -- Status history of a step; at most one row per state
        CREATE TABLE step_status (
            transport_id TEXT NOT NULL,
            state TEXT NOT NULL,
            created INTEGER NOT NULL,
            text TEXT,
            PRIMARY KEY (transport_id, state)
        );

        -- Versioned PMode configuration sets
        CREATE TABLE pmode_sets (
            set_id INTEGER PRIMARY KEY AUTOINCREMENT,
            lane_id TEXT NOT NULL,
            created INTEGER NOT NULL,
            active INTEGER NOT NULL,
            description TEXT NOT NULL,
            pmodes BLOB NOT NULL,
            connector_store_uuid TEXT
        );

        CREATE TABLE pmode_parties (
            set_id INTEGER NOT NULL,
            party_id TEXT NOT NULL,
            party_id_type TEXT,
            role TEXT,
            role_type TEXT NOT NULL
        );

        CREATE TABLE pmode_actions (
            set_id INTEGER NOT NULL,
            action TEXT NOT NULL
        );

        CREATE TABLE pmode_services (
            set_id INTEGER NOT NULL,
            service TEXT NOT NULL,
            service_type TEXT
        );

        -- Uploaded trust stores
        CREATE TABLE keystores (
            uuid TEXT PRIMARY KEY,
            bytes BLOB NOT NULL,
            password TEXT NOT NULL,
            keystore_type TEXT NOT NULL,
            description TEXT,
            uploaded INTEGER NOT NULL
        );

        -- Lane-scoped routing rules
        CREATE TABLE routing_rules (
            lane_id TEXT NOT NULL,
            rule_id TEXT NOT NULL,
            link_name TEXT NOT NULL,
            priority INTEGER NOT NULL,
            description TEXT NOT NULL,
            configuration_source TEXT NOT NULL,
            match_clause TEXT NOT NULL,
            PRIMARY KEY (lane_id, rule_id)
        );

        -- Indexes for common queries
        CREATE INDEX idx_messages_ebms ON messages(ebms_message_id);
        CREATE INDEX idx_evidences_message ON evidences(connector_message_id);
        CREATE INDEX idx_steps_message ON transport_steps(connector_message_id);
        CREATE INDEX idx_steps_partner ON transport_steps(link_partner_name);
        CREATE INDEX idx_pmode_sets_lane ON pmode_sets(lane_id, active);
        "#,
    )?;

    Ok(())
}
