//! Error types for the Hongbao service.

use hongbao_core::{PacketId, ValidationError};
use hongbao_store::StoreError;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during Hongbao operations.
///
/// Claim races are not errors; see `ClaimOutcome`.
#[derive(Debug, Error)]
pub enum HongbaoError {
    /// Envelope specs were empty or invalid.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage fault. The request cannot be answered.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Packet does not exist (or was deactivated).
    #[error("packet not found: {0}")]
    PacketNotFound(PacketId),

    /// A creator-only operation was attempted without a token.
    #[error("creator token is required")]
    TokenRequired,

    /// The presented token is not the packet's creator token.
    #[error("invalid creator token")]
    Forbidden,
}

impl HongbaoError {
    /// HTTP status the routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            HongbaoError::Validation(_) => 400,
            HongbaoError::TokenRequired => 401,
            HongbaoError::Forbidden => 403,
            HongbaoError::PacketNotFound(_) => 404,
            HongbaoError::Store(_) | HongbaoError::Config(_) => 500,
        }
    }

    /// Client-facing body. Internal faults are not described.
    pub fn body(&self) -> ErrorBody {
        let error = match self {
            HongbaoError::Validation(e) => e.to_string(),
            HongbaoError::PacketNotFound(_) => "Packet not found".to_string(),
            HongbaoError::TokenRequired => "Creator token is required".to_string(),
            HongbaoError::Forbidden => "Invalid creator token".to_string(),
            HongbaoError::Store(_) | HongbaoError::Config(_) => "Internal server error".to_string(),
        };
        ErrorBody { error }
    }
}

/// Serializable error body: `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Result type for Hongbao operations.
pub type Result<T> = std::result::Result<T, HongbaoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HongbaoError::from(ValidationError::NoEnvelopes).status_code(), 400);
        assert_eq!(HongbaoError::TokenRequired.status_code(), 401);
        assert_eq!(HongbaoError::Forbidden.status_code(), 403);
        assert_eq!(HongbaoError::PacketNotFound(PacketId::generate()).status_code(), 404);
        assert_eq!(
            HongbaoError::from(StoreError::Unavailable("down".into())).status_code(),
            500
        );
    }

    #[test]
    fn test_store_faults_are_not_described() {
        let err = HongbaoError::from(StoreError::Unavailable("disk on fire".into()));
        assert_eq!(err.body().error, "Internal server error");
    }

    #[test]
    fn test_validation_body_names_the_problem() {
        let err = HongbaoError::from(ValidationError::MissingImage { index: 2 });
        assert_eq!(err.body().error, "envelope 2 must have an imageId");
    }
}
