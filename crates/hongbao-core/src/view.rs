//! Redacted packet views.
//!
//! Anonymous requesters see amounts only on opened envelopes. Presenting the
//! creator token reveals every amount. Neither view ever contains the token
//! itself or the claimant identity.

use serde::Serialize;

use crate::packet::{Envelope, Packet};
use crate::types::{Amount, EnvelopeId, PacketId};

/// Who is looking at a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Creator,
    Public,
}

impl Viewer {
    /// Classify a requester by the credential they presented.
    pub fn for_packet(packet: &Packet, credential: Option<&str>) -> Self {
        if packet.is_creator(credential) {
            Viewer::Creator
        } else {
            Viewer::Public
        }
    }
}

/// One envelope as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeView {
    pub id: EnvelopeId,
    pub image_id: String,
    pub is_opened: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<i64>,
}

impl EnvelopeView {
    fn project(envelope: &Envelope, viewer: Viewer) -> Self {
        let amount_visible = viewer == Viewer::Creator || envelope.is_opened();
        Self {
            id: envelope.id,
            image_id: envelope.image_id.clone(),
            is_opened: envelope.is_opened(),
            amount: amount_visible.then_some(envelope.amount),
            opened_at: envelope.opened_at(),
        }
    }
}

/// A packet as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketView {
    pub id: PacketId,
    pub envelopes: Vec<EnvelopeView>,
    pub created_at: i64,
}

impl PacketView {
    /// Project a packet for an explicit viewer.
    pub fn for_viewer(packet: &Packet, viewer: Viewer) -> Self {
        Self {
            id: packet.id,
            envelopes: packet
                .envelopes
                .iter()
                .map(|e| EnvelopeView::project(e, viewer))
                .collect(),
            created_at: packet.created_at,
        }
    }

    pub fn envelope(&self, id: &EnvelopeId) -> Option<&EnvelopeView> {
        self.envelopes.iter().find(|e| &e.id == id)
    }
}

/// Project a packet for a requester presenting `credential`.
pub fn project(packet: &Packet, credential: Option<&str>) -> PacketView {
    PacketView::for_viewer(packet, Viewer::for_packet(packet, credential))
}
