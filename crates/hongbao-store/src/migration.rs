//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use hongbao_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{} is newer than supported v{}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::info!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
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
        -- One row per packet
        CREATE TABLE packets (
            id TEXT PRIMARY KEY,               -- 16 bytes, hex
            creator_token TEXT NOT NULL,       -- edit credential, hex
            total_envelopes INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,  -- 0 once soft-deleted
            created_at INTEGER NOT NULL,       -- Unix ms
            updated_at INTEGER NOT NULL        -- Unix ms
        );

        -- One row per envelope
        CREATE TABLE envelopes (
            id TEXT PRIMARY KEY,               -- 16 bytes, hex; globally unique
            packet_id TEXT NOT NULL REFERENCES packets(id),
            position INTEGER NOT NULL,         -- creation order within the packet
            amount REAL NOT NULL CHECK (amount > 0),
            image_id TEXT NOT NULL,
            is_opened INTEGER NOT NULL DEFAULT 0,
            opened_at INTEGER,                 -- Unix ms, set iff opened
            opened_by TEXT,                    -- claimant identity, audit only

            CHECK ((is_opened = 0) = (opened_at IS NULL)),
            UNIQUE (packet_id, position)
        );

        CREATE INDEX idx_envelopes_packet ON envelopes(packet_id, position);
        CREATE INDEX idx_packets_active ON packets(is_active);
        "#,
    )?;

    Ok(())
}
