//! Packets and envelopes.
//!
//! A [`Packet`] exclusively owns an ordered, non-empty list of [`Envelope`]s.
//! Envelopes are created sealed and transition to opened exactly once, through
//! the claim engine in [`crate::claim`].

use serde::{Deserialize, Serialize};

use crate::claim::{attempt_claim, ClaimOutcome};
use crate::error::ValidationError;
use crate::types::{Amount, CreatorToken, EnvelopeId, PacketId};
use crate::validation::validate_specs;

/// Caller-supplied description of one envelope, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeSpec {
    /// Requested amount. Must be positive and finite; fractions are allowed.
    pub amount: f64,
    /// Skin reference into the external image catalog. Must not be blank.
    pub image_id: String,
}

impl EnvelopeSpec {
    pub fn new(amount: impl Into<f64>, image_id: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            image_id: image_id.into(),
        }
    }
}

/// Claim state of an envelope.
///
/// `Opened` carries the claim timestamp, so "opened" and "has an opened-at"
/// cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeState {
    Sealed,
    Opened {
        /// Claim time (Unix ms).
        at: i64,
        /// Best-effort claimant identity, kept for audit only.
        by: Option<String>,
    },
}

/// One claimable unit within a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub id: EnvelopeId,
    pub amount: Amount,
    pub image_id: String,
    pub state: EnvelopeState,
}

impl Envelope {
    /// Create a sealed envelope with a fresh id.
    pub fn new(amount: Amount, image_id: impl Into<String>) -> Self {
        Self {
            id: EnvelopeId::generate(),
            amount,
            image_id: image_id.into(),
            state: EnvelopeState::Sealed,
        }
    }

    pub fn is_opened(&self) -> bool {
        matches!(self.state, EnvelopeState::Opened { .. })
    }

    pub fn opened_at(&self) -> Option<i64> {
        match self.state {
            EnvelopeState::Opened { at, .. } => Some(at),
            EnvelopeState::Sealed => None,
        }
    }

    pub fn opened_by(&self) -> Option<&str> {
        match &self.state {
            EnvelopeState::Opened { by, .. } => by.as_deref(),
            EnvelopeState::Sealed => None,
        }
    }

    /// Return the envelope to the sealed state. Only the creator's reset
    /// operation does this.
    pub fn reseal(&mut self) {
        self.state = EnvelopeState::Sealed;
    }
}

/// Build sealed envelopes from specs, validating the whole batch first.
///
/// Either every spec is valid and every envelope is built, or nothing is.
pub fn seal_envelopes(specs: &[EnvelopeSpec]) -> Result<Vec<Envelope>, ValidationError> {
    let amounts = validate_specs(specs)?;
    Ok(specs
        .iter()
        .zip(amounts)
        .map(|(spec, amount)| Envelope::new(amount, spec.image_id.clone()))
        .collect())
}

/// The top-level shareable bundle of envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: PacketId,
    pub creator_token: CreatorToken,
    /// Envelopes in creation order.
    pub envelopes: Vec<Envelope>,
    /// Creation time (Unix ms).
    pub created_at: i64,
    /// Last replace/reset time (Unix ms).
    pub updated_at: i64,
}

impl Packet {
    /// Build a new packet from specs, with a fresh id and creator token.
    pub fn from_specs(specs: &[EnvelopeSpec], now: i64) -> Result<Self, ValidationError> {
        let envelopes = seal_envelopes(specs)?;
        Ok(Self {
            id: PacketId::generate(),
            creator_token: CreatorToken::generate(),
            envelopes,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn envelope(&self, id: &EnvelopeId) -> Option<&Envelope> {
        self.envelopes.iter().find(|e| &e.id == id)
    }

    pub fn envelope_mut(&mut self, id: &EnvelopeId) -> Option<&mut Envelope> {
        self.envelopes.iter_mut().find(|e| &e.id == id)
    }

    /// Number of envelopes already claimed.
    pub fn opened_count(&self) -> usize {
        self.envelopes.iter().filter(|e| e.is_opened()).count()
    }

    /// Whether a presented credential proves authorship of this packet.
    pub fn is_creator(&self, credential: Option<&str>) -> bool {
        credential.is_some_and(|c| self.creator_token.matches(c))
    }

    /// Run the claim transition on one of this packet's envelopes.
    ///
    /// The caller must hold whatever exclusion protects this packet; the
    /// check and the mutation happen here in one step.
    pub fn claim(&mut self, envelope_id: &EnvelopeId, claimant: Option<&str>, at: i64) -> ClaimOutcome {
        let packet_id = self.id;
        attempt_claim(&packet_id, self.envelope_mut(envelope_id), claimant, at)
    }

    /// Swap in a new envelope set, discarding all prior claim state.
    pub fn replace_envelopes(&mut self, envelopes: Vec<Envelope>, at: i64) {
        self.envelopes = envelopes;
        self.updated_at = at;
    }

    /// Re-seal every envelope, keeping ids and amounts.
    pub fn reset(&mut self, at: i64) {
        for envelope in &mut self.envelopes {
            envelope.reseal();
        }
        self.updated_at = at;
    }
}
