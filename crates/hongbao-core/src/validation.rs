//! Envelope spec validation.
//!
//! Boundary layers are expected to check payload shape already; these checks
//! run again before anything reaches storage.

use crate::error::ValidationError;
use crate::packet::EnvelopeSpec;
use crate::types::Amount;

/// Validate a single spec at position `index` in its batch.
///
/// The amount must be finite and greater than zero. An image id made only of
/// whitespace counts as missing.
pub fn validate_spec(index: usize, spec: &EnvelopeSpec) -> Result<Amount, ValidationError> {
    let amount = Amount::new(spec.amount).ok_or(ValidationError::InvalidAmount {
        index,
        amount: spec.amount,
    })?;

    if spec.image_id.trim().is_empty() {
        return Err(ValidationError::MissingImage { index });
    }

    Ok(amount)
}

/// Validate a whole batch of specs.
///
/// Rejects an empty batch and stops at the first invalid spec. On success,
/// returns the validated amounts in batch order.
pub fn validate_specs(specs: &[EnvelopeSpec]) -> Result<Vec<Amount>, ValidationError> {
    if specs.is_empty() {
        return Err(ValidationError::NoEnvelopes);
    }

    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| validate_spec(index, spec))
        .collect()
}
