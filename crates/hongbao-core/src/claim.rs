//! The claim engine: deciding whether a claim attempt wins.
//!
//! The transition itself is pure. Linearizability comes from the caller:
//! every store runs [`attempt_claim`] (or an equivalent conditional update)
//! inside a region that excludes other claims on the same envelope, so the
//! "is it opened? then open it" sequence is indivisible.

use serde::Serialize;

use crate::packet::{Envelope, EnvelopeState};
use crate::types::{Amount, EnvelopeId, PacketId};

/// Message returned to a loser of a claim race.
pub const ALREADY_OPENED_MESSAGE: &str = "This envelope has already been opened";

/// Message returned when the envelope cannot be resolved.
pub const NOT_FOUND_MESSAGE: &str = "Envelope not found";

/// A single claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    /// When set, the envelope must belong to this (active) packet.
    pub packet_id: Option<PacketId>,
    pub envelope_id: EnvelopeId,
    /// Best-effort claimant identity (e.g. network origin). Never required.
    pub claimant: Option<String>,
    /// Claim time (Unix ms), recorded as the envelope's opened-at.
    pub at: i64,
}

impl ClaimRequest {
    pub fn new(envelope_id: EnvelopeId, at: i64) -> Self {
        Self {
            packet_id: None,
            envelope_id,
            claimant: None,
            at,
        }
    }

    /// Restrict the claim to envelopes of `packet_id`.
    pub fn in_packet(mut self, packet_id: PacketId) -> Self {
        self.packet_id = Some(packet_id);
        self
    }

    pub fn claimant(mut self, claimant: Option<impl Into<String>>) -> Self {
        self.claimant = claimant.map(Into::into);
        self
    }
}

/// The full record of a freshly claimed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedEnvelope {
    pub packet_id: PacketId,
    pub id: EnvelopeId,
    pub amount: Amount,
    pub image_id: String,
    pub opened_at: i64,
}

/// Result of a claim attempt.
///
/// `AlreadyOpened` and `NotFound` are ordinary outcomes, not faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This attempt won the envelope.
    Claimed(ClaimedEnvelope),
    /// Someone else already won it.
    AlreadyOpened,
    /// No such envelope (or it belongs to another or inactive packet).
    NotFound,
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed(_))
    }

    pub fn claimed(&self) -> Option<&ClaimedEnvelope> {
        match self {
            ClaimOutcome::Claimed(envelope) => Some(envelope),
            _ => None,
        }
    }

    /// Short user-facing message for failed claims.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            ClaimOutcome::Claimed(_) => None,
            ClaimOutcome::AlreadyOpened => Some(ALREADY_OPENED_MESSAGE),
            ClaimOutcome::NotFound => Some(NOT_FOUND_MESSAGE),
        }
    }

    /// HTTP status the routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ClaimOutcome::Claimed(_) => 200,
            ClaimOutcome::AlreadyOpened | ClaimOutcome::NotFound => 400,
        }
    }
}

/// Apply the claim transition to an envelope of `packet_id`.
///
/// `envelope` is `None` when the lookup failed.
pub fn attempt_claim(
    packet_id: &PacketId,
    envelope: Option<&mut Envelope>,
    claimant: Option<&str>,
    at: i64,
) -> ClaimOutcome {
    let Some(envelope) = envelope else {
        return ClaimOutcome::NotFound;
    };

    if envelope.is_opened() {
        return ClaimOutcome::AlreadyOpened;
    }

    envelope.state = EnvelopeState::Opened {
        at,
        by: claimant.map(str::to_string),
    };

    ClaimOutcome::Claimed(ClaimedEnvelope {
        packet_id: *packet_id,
        id: envelope.id,
        amount: envelope.amount,
        image_id: envelope.image_id.clone(),
        opened_at: at,
    })
}

/// Serializable body for a claim response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<ClaimedEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&ClaimOutcome> for ClaimResponse {
    fn from(outcome: &ClaimOutcome) -> Self {
        Self {
            success: outcome.is_claimed(),
            envelope: outcome.claimed().cloned(),
            message: outcome.message().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed(amount: f64) -> Envelope {
        Envelope::new(Amount::new(amount).unwrap(), "fish")
    }

    #[test]
    fn test_missing_envelope_is_not_found() {
        let outcome = attempt_claim(&PacketId::generate(), None, None, 1);
        assert_eq!(outcome, ClaimOutcome::NotFound);
        assert_eq!(outcome.message(), Some(NOT_FOUND_MESSAGE));
        assert_eq!(outcome.status_code(), 400);
    }

    #[test]
    fn test_first_claim_wins() {
        let packet_id = PacketId::generate();
        let mut envelope = sealed(88.0);
        let outcome = attempt_claim(&packet_id, Some(&mut envelope), Some("1.2.3.4"), 42);

        let claimed = outcome.claimed().unwrap();
        assert_eq!(claimed.packet_id, packet_id);
        assert_eq!(claimed.id, envelope.id);
        assert_eq!(claimed.amount.get(), 88.0);
        assert_eq!(claimed.opened_at, 42);
        assert_eq!(envelope.opened_at(), Some(42));
        assert_eq!(envelope.opened_by(), Some("1.2.3.4"));
        assert_eq!(outcome.status_code(), 200);
    }

    #[test]
    fn test_repeat_claims_are_idempotent_failures() {
        let packet_id = PacketId::generate();
        let mut envelope = sealed(88.0);
        assert!(attempt_claim(&packet_id, Some(&mut envelope), None, 10).is_claimed());

        for at in 11..20 {
            let outcome = attempt_claim(&packet_id, Some(&mut envelope), Some("late"), at);
            assert_eq!(outcome, ClaimOutcome::AlreadyOpened);
        }
        assert_eq!(envelope.opened_at(), Some(10));
        assert_eq!(envelope.opened_by(), None);
    }

    #[test]
    fn test_claim_without_identity() {
        let mut envelope = sealed(1.0);
        let outcome = attempt_claim(&PacketId::generate(), Some(&mut envelope), None, 3);
        assert!(outcome.is_claimed());
        assert!(envelope.is_opened());
    }

    #[test]
    fn test_response_body_shapes() {
        let packet_id = PacketId::generate();
        let mut envelope = sealed(66.0);
        let won = attempt_claim(&packet_id, Some(&mut envelope), None, 7);

        let body = serde_json::to_value(ClaimResponse::from(&won)).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["envelope"]["amount"], 66);
        assert_eq!(body["envelope"]["imageId"], "fish");
        assert_eq!(body["envelope"]["openedAt"], 7);
        assert!(body.get("message").is_none());

        let body = serde_json::to_value(ClaimResponse::from(&ClaimOutcome::AlreadyOpened)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], ALREADY_OPENED_MESSAGE);
        assert!(body.get("envelope").is_none());
    }

    #[test]
    fn test_request_builder() {
        let packet_id = PacketId::generate();
        let envelope_id = EnvelopeId::generate();
        let request = ClaimRequest::new(envelope_id, 5)
            .in_packet(packet_id)
            .claimant(Some("10.1.1.1"));
        assert_eq!(request.packet_id, Some(packet_id));
        assert_eq!(request.claimant.as_deref(), Some("10.1.1.1"));

        let anonymous = ClaimRequest::new(envelope_id, 5).claimant(None::<String>);
        assert_eq!(anonymous.claimant, None);
    }
}
