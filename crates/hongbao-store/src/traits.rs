//! Store trait: the abstract interface for packet persistence.
//!
//! This trait lets the service stay backend-agnostic. Implementations
//! include SQLite (durable) and in-memory (volatile). Both must behave the
//! same from the caller's side except for surviving restarts.

use std::sync::Arc;

use async_trait::async_trait;
use hongbao_core::{ClaimOutcome, ClaimRequest, Envelope, Packet, PacketId};

use crate::error::{Result, StoreError};

/// Reject an empty envelope set. A stored packet always owns at least one
/// envelope.
pub(crate) fn ensure_envelopes(envelopes: &[Envelope]) -> Result<()> {
    if envelopes.is_empty() {
        return Err(StoreError::InvalidData("envelope set must not be empty".to_string()));
    }
    Ok(())
}

/// The Store trait: async interface for packet persistence.
///
/// All methods are async to support both blocking (SQLite) and purely
/// in-process backends. For SQLite, work runs on `spawn_blocking`.
///
/// # Atomicity
///
/// - `create_packet`, `replace_envelopes` and `reset_packet` are all-or-nothing.
/// - `claim` is indivisible per envelope: of any number of concurrent claims
///   on one sealed envelope, exactly one returns `Claimed`.
/// - `replace_envelopes` excludes claims on the same packet while it swaps,
///   so a racing claim sees the whole old set or the whole new set.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Packet Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a packet and all of its envelopes as one unit.
    ///
    /// Fails with `Conflict` if the packet id or any envelope id is taken,
    /// and with `InvalidData` if the packet has no envelopes. Either way
    /// nothing is persisted.
    async fn create_packet(&self, packet: &Packet) -> Result<()>;

    /// Get an active packet with its envelopes in creation order.
    async fn get_packet(&self, id: &PacketId) -> Result<Option<Packet>>;

    /// Discard a packet's envelopes and install `envelopes` in their place.
    ///
    /// All claim state is lost. Returns `false` if the packet is absent or
    /// inactive. An empty `envelopes` fails with `InvalidData`, and an id
    /// owned by another packet fails with `Conflict`; both leave the old set
    /// in place.
    async fn replace_envelopes(&self, id: &PacketId, envelopes: &[Envelope], at: i64) -> Result<bool>;

    /// Re-seal every envelope of a packet, keeping ids and amounts.
    ///
    /// Returns `false` if the packet is absent or inactive.
    async fn reset_packet(&self, id: &PacketId, at: i64) -> Result<bool>;

    /// Soft-delete a packet. It disappears from reads and claims.
    ///
    /// Returns `false` if the packet is absent or already inactive.
    async fn deactivate_packet(&self, id: &PacketId, at: i64) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Claim Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Attempt to claim an envelope.
    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome>;

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Cheap round trip proving the backend can serve requests.
    async fn health_check(&self) -> Result<()>;

    /// Short backend name for logs and health reports.
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn create_packet(&self, packet: &Packet) -> Result<()> {
        (**self).create_packet(packet).await
    }

    async fn get_packet(&self, id: &PacketId) -> Result<Option<Packet>> {
        (**self).get_packet(id).await
    }

    async fn replace_envelopes(&self, id: &PacketId, envelopes: &[Envelope], at: i64) -> Result<bool> {
        (**self).replace_envelopes(id, envelopes, at).await
    }

    async fn reset_packet(&self, id: &PacketId, at: i64) -> Result<bool> {
        (**self).reset_packet(id, at).await
    }

    async fn deactivate_packet(&self, id: &PacketId, at: i64) -> Result<bool> {
        (**self).deactivate_packet(id, at).await
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome> {
        (**self).claim(request).await
    }

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}
