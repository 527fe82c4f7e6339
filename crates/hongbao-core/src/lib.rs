//! # Hongbao Core
//!
//! Pure primitives for Hongbao: packets of claimable envelopes, the claim
//! transition, and redacted views.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Packet`] - A shareable bundle of envelopes owned by one creator
//! - [`Envelope`] - One claimable unit carrying an amount and a skin
//! - [`ClaimOutcome`] - Result of a claim attempt (`Claimed`, `AlreadyOpened`, `NotFound`)
//! - [`PacketView`] - A packet with amounts redacted for the requester
//!
//! ## Claims
//!
//! An envelope is opened at most once. [`attempt_claim`] is the transition;
//! stores are responsible for running it under exclusion. See [`claim`].

pub mod claim;
pub mod error;
pub mod packet;
pub mod types;
pub mod validation;
pub mod view;

pub use claim::{
    attempt_claim, ClaimOutcome, ClaimRequest, ClaimResponse, ClaimedEnvelope,
    ALREADY_OPENED_MESSAGE, NOT_FOUND_MESSAGE,
};
pub use error::ValidationError;
pub use packet::{seal_envelopes, Envelope, EnvelopeSpec, EnvelopeState, Packet};
pub use types::{now_millis, Amount, CreatorToken, EnvelopeId, PacketId};
pub use validation::{validate_spec, validate_specs};
pub use view::{project, EnvelopeView, PacketView, Viewer};
