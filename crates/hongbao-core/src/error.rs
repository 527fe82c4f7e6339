//! Error types for Hongbao Core.

use thiserror::Error;

/// Validation errors for envelope specs and identifiers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("envelopes array is required and must not be empty")]
    NoEnvelopes,

    #[error("envelope {index} must have a positive amount, got {amount}")]
    InvalidAmount { index: usize, amount: f64 },

    #[error("envelope {index} must have an imageId")]
    MissingImage { index: usize },

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
