//! The Hongbao service: unified API over a packet store.
//!
//! Brings together validation, the store and the redacted views. Creator-only
//! operations check the token here; claims are delegated to the store, which
//! owns their atomicity.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use hongbao_core::{
    now_millis, project, seal_envelopes, ClaimOutcome, ClaimRequest, EnvelopeId, EnvelopeSpec,
    Packet, PacketId, PacketView, Viewer,
};
use hongbao_store::Store;

use crate::backend::Backend;
use crate::config::HongbaoConfig;
use crate::error::{HongbaoError, Result};

/// A newly created packet, as returned once to its creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPacket {
    /// Creator view: every amount visible.
    #[serde(flatten)]
    pub packet: PacketView,
    /// The edit credential. Never returned again.
    pub creator_token: String,
}

impl CreatedPacket {
    /// HTTP status for a successful creation.
    pub fn status_code(&self) -> u16 {
        201
    }
}

/// Result of a health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub backend: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The main Hongbao struct.
///
/// Provides a unified API for:
/// - Creating packets
/// - Viewing packets (redacted per requester)
/// - Claiming envelopes
/// - Editing, resetting and deactivating packets (creator only)
pub struct Hongbao<S: Store> {
    /// The storage backend.
    store: Arc<S>,
}

impl<S: Store> Clone for Hongbao<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl Hongbao<Backend> {
    /// Open the configured backend and build a service on it.
    pub fn open(config: &HongbaoConfig) -> Result<Self> {
        Ok(Self::new(Backend::open_with_fallback(config)?))
    }
}

impl<S: Store> Hongbao<S> {
    /// Create a new service instance.
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Create a service over a store shared with other owners.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Packet Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a packet from envelope specs.
    ///
    /// The whole batch is rejected if it is empty or any spec is invalid.
    pub async fn create_packet(&self, specs: &[EnvelopeSpec]) -> Result<CreatedPacket> {
        let packet = Packet::from_specs(specs, now_millis())?;
        self.store.create_packet(&packet).await?;

        info!(packet = %packet.id, envelopes = packet.envelopes.len(), "packet created");

        Ok(CreatedPacket {
            packet: PacketView::for_viewer(&packet, Viewer::Creator),
            creator_token: packet.creator_token.as_str().to_string(),
        })
    }

    /// View a packet. Amounts of sealed envelopes are visible only with the
    /// creator token.
    pub async fn get_packet(&self, id: &PacketId, token: Option<&str>) -> Result<PacketView> {
        let packet = self
            .store
            .get_packet(id)
            .await?
            .ok_or(HongbaoError::PacketNotFound(*id))?;
        Ok(project(&packet, token))
    }

    /// Replace every envelope of a packet. All prior claims are discarded.
    pub async fn edit_packet(
        &self,
        id: &PacketId,
        token: Option<&str>,
        specs: &[EnvelopeSpec],
    ) -> Result<PacketView> {
        let mut packet = self.authorize(id, token).await?;
        let envelopes = seal_envelopes(specs)?;
        let now = now_millis();

        if !self.store.replace_envelopes(id, &envelopes, now).await? {
            return Err(HongbaoError::PacketNotFound(*id));
        }

        info!(
            packet = %id,
            discarded_claims = packet.opened_count(),
            envelopes = envelopes.len(),
            "packet edited"
        );

        packet.replace_envelopes(envelopes, now);
        Ok(PacketView::for_viewer(&packet, Viewer::Creator))
    }

    /// Re-seal every envelope of a packet, keeping ids and amounts.
    pub async fn reset_packet(&self, id: &PacketId, token: Option<&str>) -> Result<PacketView> {
        let mut packet = self.authorize(id, token).await?;
        let now = now_millis();

        if !self.store.reset_packet(id, now).await? {
            return Err(HongbaoError::PacketNotFound(*id));
        }

        info!(packet = %id, "packet reset");

        packet.reset(now);
        Ok(PacketView::for_viewer(&packet, Viewer::Creator))
    }

    /// Soft-delete a packet.
    pub async fn deactivate_packet(&self, id: &PacketId, token: Option<&str>) -> Result<()> {
        self.authorize(id, token).await?;

        if !self.store.deactivate_packet(id, now_millis()).await? {
            return Err(HongbaoError::PacketNotFound(*id));
        }

        info!(packet = %id, "packet deactivated");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Claim Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Claim an envelope of a packet.
    ///
    /// No credential is needed. `claimant` is an optional identity hint kept
    /// for audit; its absence never blocks a claim.
    pub async fn claim(
        &self,
        packet_id: &PacketId,
        envelope_id: &EnvelopeId,
        claimant: Option<&str>,
    ) -> Result<ClaimOutcome> {
        let request = ClaimRequest::new(*envelope_id, now_millis())
            .in_packet(*packet_id)
            .claimant(claimant);
        let outcome = self.store.claim(&request).await?;

        match &outcome {
            ClaimOutcome::Claimed(envelope) => {
                info!(packet = %packet_id, envelope = %envelope_id, "envelope claimed");
                debug!(envelope = %envelope_id, claimant = ?claimant, amount = %envelope.amount, "claim details");
            }
            ClaimOutcome::AlreadyOpened => {
                debug!(packet = %packet_id, envelope = %envelope_id, "envelope already opened");
            }
            ClaimOutcome::NotFound => {
                debug!(packet = %packet_id, envelope = %envelope_id, "envelope not found");
            }
        }

        Ok(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Check that the backend answers.
    pub async fn health(&self) -> HealthReport {
        let result = self.store.health_check().await;
        HealthReport {
            backend: self.store.backend_name(),
            healthy: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        }
    }

    /// Load a packet and check the creator token against it.
    ///
    /// A missing (or empty) token is rejected before the lookup; a wrong one
    /// only after the packet is known to exist.
    async fn authorize(&self, id: &PacketId, token: Option<&str>) -> Result<Packet> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(HongbaoError::TokenRequired)?;

        let packet = self
            .store
            .get_packet(id)
            .await?
            .ok_or(HongbaoError::PacketNotFound(*id))?;

        if !packet.creator_token.matches(token) {
            debug!(packet = %id, "creator token mismatch");
            return Err(HongbaoError::Forbidden);
        }

        Ok(packet)
    }
}
