//! SQLite implementation of the Store trait.
//!
//! This is the durable storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.
//!
//! Claims never read the opened flag and then write it in a separate step.
//! A single conditional `UPDATE ... WHERE is_opened = 0` decides the winner by
//! its affected-row count; the follow-up reads only classify the result.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::debug;

use hongbao_core::{
    Amount, ClaimOutcome, ClaimRequest, ClaimedEnvelope, CreatorToken, Envelope, EnvelopeId,
    EnvelopeState, Packet, PacketId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{ensure_envelopes, Store};

/// How long a writer waits on another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and missing parent directories) and runs migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened sqlite store");
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("connection mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

/// Map primary-key/unique violations to `Conflict`, everything else to `Database`.
fn conflict_or_database(err: rusqlite::Error, what: impl FnOnce() -> String) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Conflict(what())
        }
        _ => StoreError::Database(err),
    }
}

/// Insert a packet's envelopes with bound parameters, in order.
///
/// Must run inside the caller's transaction; a failure leaves the rollback to it.
fn insert_envelopes(tx: &Transaction<'_>, packet_id: &PacketId, envelopes: &[Envelope]) -> Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO envelopes (
            id, packet_id, position, amount, image_id, is_opened, opened_at, opened_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    let packet_hex = packet_id.to_hex();
    for (position, envelope) in envelopes.iter().enumerate() {
        stmt.execute(params![
            envelope.id.to_hex(),
            packet_hex,
            position as i64,
            envelope.amount.get(),
            envelope.image_id,
            envelope.is_opened(),
            envelope.opened_at(),
            envelope.opened_by(),
        ])
        .map_err(|e| conflict_or_database(e, || format!("envelope {} already exists", envelope.id)))?;
    }

    Ok(())
}

/// Raw envelope columns, converted to an [`Envelope`] after the query.
struct EnvelopeRow {
    id: String,
    amount: f64,
    image_id: String,
    is_opened: bool,
    opened_at: Option<i64>,
    opened_by: Option<String>,
}

impl EnvelopeRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            amount: row.get("amount")?,
            image_id: row.get("image_id")?,
            is_opened: row.get("is_opened")?,
            opened_at: row.get("opened_at")?,
            opened_by: row.get("opened_by")?,
        })
    }

    fn into_envelope(self) -> Result<Envelope> {
        let state = match (self.is_opened, self.opened_at) {
            (false, None) => EnvelopeState::Sealed,
            (true, Some(at)) => EnvelopeState::Opened {
                at,
                by: self.opened_by,
            },
            _ => {
                return Err(StoreError::InvalidData(format!(
                    "envelope {} has inconsistent opened state",
                    self.id
                )))
            }
        };

        Ok(Envelope {
            id: parse_envelope_id(&self.id)?,
            amount: parse_amount(self.amount)?,
            image_id: self.image_id,
            state,
        })
    }
}

fn parse_envelope_id(hex: &str) -> Result<EnvelopeId> {
    EnvelopeId::from_hex(hex)
        .map_err(|e| StoreError::InvalidData(format!("bad envelope id {:?}: {}", hex, e)))
}

fn parse_packet_id(hex: &str) -> Result<PacketId> {
    PacketId::from_hex(hex).map_err(|e| StoreError::InvalidData(format!("bad packet id {:?}: {}", hex, e)))
}

fn parse_amount(amount: f64) -> Result<Amount> {
    Amount::new(amount).ok_or_else(|| StoreError::InvalidData(format!("invalid amount {}", amount)))
}

fn load_envelopes(conn: &Connection, packet_id: &PacketId) -> Result<Vec<Envelope>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, amount, image_id, is_opened, opened_at, opened_by
         FROM envelopes WHERE packet_id = ?1
         ORDER BY position",
    )?;

    let rows = stmt
        .query_map(params![packet_id.to_hex()], EnvelopeRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(EnvelopeRow::into_envelope).collect()
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_packet(&self, packet: &Packet) -> Result<()> {
        ensure_envelopes(&packet.envelopes)?;
        let packet = packet.clone();

        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            tx.execute(
                "INSERT INTO packets (
                    id, creator_token, total_envelopes, is_active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, 1, ?4, ?5)",
                params![
                    packet.id.to_hex(),
                    packet.creator_token.as_str(),
                    packet.envelopes.len() as i64,
                    packet.created_at,
                    packet.updated_at,
                ],
            )
            .map_err(|e| conflict_or_database(e, || format!("packet {} already exists", packet.id)))?;

            insert_envelopes(&tx, &packet.id, &packet.envelopes)?;
            tx.commit()?;

            debug!(packet = %packet.id, envelopes = packet.envelopes.len(), "stored packet");
            Ok(())
        })
        .await
    }

    async fn get_packet(&self, id: &PacketId) -> Result<Option<Packet>> {
        let id = *id;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let header = tx
                .query_row(
                    "SELECT creator_token, created_at, updated_at
                     FROM packets WHERE id = ?1 AND is_active = 1",
                    params![id.to_hex()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;

            let Some((token, created_at, updated_at)) = header else {
                return Ok(None);
            };

            let envelopes = load_envelopes(&tx, &id)?;
            tx.commit()?;

            Ok(Some(Packet {
                id,
                creator_token: CreatorToken::from_stored(token),
                envelopes,
                created_at,
                updated_at,
            }))
        })
        .await
    }

    async fn replace_envelopes(&self, id: &PacketId, envelopes: &[Envelope], at: i64) -> Result<bool> {
        ensure_envelopes(envelopes)?;
        let id = *id;
        let envelopes = envelopes.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let touched = tx.execute(
                "UPDATE packets SET total_envelopes = ?1, updated_at = ?2
                 WHERE id = ?3 AND is_active = 1",
                params![envelopes.len() as i64, at, id.to_hex()],
            )?;
            if touched == 0 {
                return Ok(false);
            }

            tx.execute(
                "DELETE FROM envelopes WHERE packet_id = ?1",
                params![id.to_hex()],
            )?;
            insert_envelopes(&tx, &id, &envelopes)?;
            tx.commit()?;

            debug!(packet = %id, envelopes = envelopes.len(), "replaced envelopes");
            Ok(true)
        })
        .await
    }

    async fn reset_packet(&self, id: &PacketId, at: i64) -> Result<bool> {
        let id = *id;

        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let touched = tx.execute(
                "UPDATE packets SET updated_at = ?1 WHERE id = ?2 AND is_active = 1",
                params![at, id.to_hex()],
            )?;
            if touched == 0 {
                return Ok(false);
            }

            tx.execute(
                "UPDATE envelopes SET is_opened = 0, opened_at = NULL, opened_by = NULL
                 WHERE packet_id = ?1",
                params![id.to_hex()],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn deactivate_packet(&self, id: &PacketId, at: i64) -> Result<bool> {
        let id = *id;

        self.with_conn(move |conn| {
            let touched = conn.execute(
                "UPDATE packets SET is_active = 0, updated_at = ?1
                 WHERE id = ?2 AND is_active = 1",
                params![at, id.to_hex()],
            )?;
            Ok(touched > 0)
        })
        .await
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome> {
        let request = request.clone();

        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let envelope_hex = request.envelope_id.to_hex();
            let packet_hex = request.packet_id.map(|p| p.to_hex());

            let won = tx.execute(
                "UPDATE envelopes SET is_opened = 1, opened_at = ?1, opened_by = ?2
                 WHERE id = ?3
                   AND is_opened = 0
                   AND (?4 IS NULL OR packet_id = ?4)
                   AND packet_id IN (SELECT id FROM packets WHERE is_active = 1)",
                params![request.at, request.claimant, envelope_hex, packet_hex],
            )?;

            let outcome = if won == 1 {
                let (packet_id, amount, image_id, opened_at) = tx.query_row(
                    "SELECT packet_id, amount, image_id, opened_at FROM envelopes WHERE id = ?1",
                    params![envelope_hex],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )?;
                ClaimOutcome::Claimed(ClaimedEnvelope {
                    packet_id: parse_packet_id(&packet_id)?,
                    id: request.envelope_id,
                    amount: parse_amount(amount)?,
                    image_id,
                    opened_at,
                })
            } else {
                let opened: Option<bool> = tx
                    .query_row(
                        "SELECT e.is_opened FROM envelopes e
                         JOIN packets p ON p.id = e.packet_id
                         WHERE e.id = ?1
                           AND p.is_active = 1
                           AND (?2 IS NULL OR e.packet_id = ?2)",
                        params![envelope_hex, packet_hex],
                        |row| row.get(0),
                    )
                    .optional()?;
                match opened {
                    Some(true) => ClaimOutcome::AlreadyOpened,
                    None => ClaimOutcome::NotFound,
                    Some(false) => {
                        return Err(StoreError::InvalidData(format!(
                            "claim update skipped sealed envelope {}",
                            request.envelope_id
                        )))
                    }
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn health_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hongbao_core::EnvelopeSpec;

    fn make_packet(amounts: &[i64]) -> Packet {
        let specs: Vec<_> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| EnvelopeSpec::new(*a as f64, format!("skin-{}", i)))
            .collect();
        Packet::from_specs(&specs, 1_700_000_000_000).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_packet() {
        let store = SqliteStore::open_memory().unwrap();
        let packet = make_packet(&[50_000, 100_000, 3]);

        store.create_packet(&packet).await.unwrap();

        let retrieved = store.get_packet(&packet.id).await.unwrap().unwrap();
        assert_eq!(retrieved, packet);
    }

    #[tokio::test]
    async fn test_envelope_order_is_creation_order() {
        let store = SqliteStore::open_memory().unwrap();
        let amounts: Vec<i64> = (1..=25).rev().collect();
        let packet = make_packet(&amounts);

        store.create_packet(&packet).await.unwrap();

        let retrieved = store.get_packet(&packet.id).await.unwrap().unwrap();
        let got: Vec<i64> = retrieved.envelopes.iter().map(|e| e.amount.get() as i64).collect();
        assert_eq!(got, amounts);
    }

    #[tokio::test]
    async fn test_fractional_amounts_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let specs = [EnvelopeSpec::new(10.5, "koi"), EnvelopeSpec::new(0.01, "lantern")];
        let packet = Packet::from_specs(&specs, 1).unwrap();

        store.create_packet(&packet).await.unwrap();

        let retrieved = store.get_packet(&packet.id).await.unwrap().unwrap();
        assert_eq!(retrieved.envelopes[0].amount.get(), 10.5);
        assert_eq!(retrieved.envelopes[1].amount.get(), 0.01);

        let claimed = store
            .claim(&ClaimRequest::new(packet.envelopes[0].id, 2))
            .await
            .unwrap();
        assert_eq!(claimed.claimed().unwrap().amount.get(), 10.5);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing() {
        let store = SqliteStore::open_memory().unwrap();
        let first = make_packet(&[10]);
        store.create_packet(&first).await.unwrap();

        let mut second = make_packet(&[20, 30]);
        second.envelopes[1].id = first.envelopes[0].id;

        let err = store.create_packet(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {:?}", err);
        assert!(store.get_packet(&second.id).await.unwrap().is_none());
        assert_eq!(
            store
                .claim(&ClaimRequest::new(second.envelopes[0].id, 1))
                .await
                .unwrap(),
            ClaimOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_claim_conditional_update() {
        let store = SqliteStore::open_memory().unwrap();
        let packet = make_packet(&[66]);
        store.create_packet(&packet).await.unwrap();
        let envelope_id = packet.envelopes[0].id;

        let first = store
            .claim(&ClaimRequest::new(envelope_id, 10).claimant(Some("198.51.100.4")))
            .await
            .unwrap();
        let claimed = first.claimed().unwrap();
        assert_eq!(claimed.packet_id, packet.id);
        assert_eq!(claimed.amount.get(), 66.0);
        assert_eq!(claimed.image_id, "skin-0");
        assert_eq!(claimed.opened_at, 10);

        let second = store.claim(&ClaimRequest::new(envelope_id, 11)).await.unwrap();
        assert_eq!(second, ClaimOutcome::AlreadyOpened);

        let stored = store.get_packet(&packet.id).await.unwrap().unwrap();
        assert_eq!(stored.envelopes[0].opened_at(), Some(10));
        assert_eq!(stored.envelopes[0].opened_by(), Some("198.51.100.4"));
    }

    #[tokio::test]
    async fn test_claim_unknown_envelope() {
        let store = SqliteStore::open_memory().unwrap();
        let outcome = store
            .claim(&ClaimRequest::new(EnvelopeId::generate(), 1))
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_replace_and_reset() {
        let store = SqliteStore::open_memory().unwrap();
        let packet = make_packet(&[1, 2]);
        store.create_packet(&packet).await.unwrap();
        store
            .claim(&ClaimRequest::new(packet.envelopes[0].id, 5))
            .await
            .unwrap();

        assert!(store.reset_packet(&packet.id, 6).await.unwrap());
        let reset = store.get_packet(&packet.id).await.unwrap().unwrap();
        assert_eq!(reset.opened_count(), 0);
        assert_eq!(reset.envelopes[0].id, packet.envelopes[0].id);
        assert_eq!(reset.updated_at, 6);

        let fresh = make_packet(&[300_000]).envelopes;
        assert!(store.replace_envelopes(&packet.id, &fresh, 7).await.unwrap());
        let replaced = store.get_packet(&packet.id).await.unwrap().unwrap();
        assert_eq!(replaced.envelopes, fresh);

        assert!(!store
            .replace_envelopes(&PacketId::generate(), &fresh, 8)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_reopen_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hongbao.db");
        let packet = make_packet(&[200_000, 1]);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_packet(&packet).await.unwrap();
            store
                .claim(&ClaimRequest::new(packet.envelopes[0].id, 42))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let retrieved = store.get_packet(&packet.id).await.unwrap().unwrap();
        assert_eq!(retrieved.creator_token, packet.creator_token);
        assert_eq!(retrieved.envelopes[0].opened_at(), Some(42));
        assert!(!retrieved.envelopes[1].is_opened());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_single_winner() {
        let store = Arc::new(SqliteStore::open_memory().unwrap());
        let packet = make_packet(&[888]);
        store.create_packet(&packet).await.unwrap();
        let envelope_id = packet.envelopes[0].id;

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .claim(&ClaimRequest::new(envelope_id, 1_000 + i))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_claimed() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = SqliteStore::open_memory().unwrap();
        store.health_check().await.unwrap();
        assert_eq!(store.backend_name(), "sqlite");
    }
}
