//! Strong type definitions for Hongbao.
//!
//! All identifiers are newtypes to prevent misuse at compile time. Ids are
//! random bytes rendered as lowercase hex on the wire and in storage.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Length of the identifier in bytes.
            pub const LEN: usize = $len;

            /// Create an identifier from raw bytes.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                let mut bytes = [0u8; $len];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Convert to lowercase hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let mut arr = [0u8; $len];
                hex::decode_to_slice(s, &mut arr)?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..8])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s).map_err(|_| ValidationError::InvalidId(s.to_string()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// Identifier of a packet, assigned once at creation.
    PacketId,
    16
);

hex_id!(
    /// Identifier of an envelope.
    ///
    /// Globally unique, not merely unique within its packet, so a claim can
    /// resolve an envelope without knowing the parent packet.
    EnvelopeId,
    16
);

/// Length of a freshly generated creator token, in random bytes.
const CREATOR_TOKEN_BYTES: usize = 32;

/// Secret proving authorship of a packet.
///
/// Compared by exact string equality. The `Debug` output never reveals the
/// secret.
#[derive(Clone, PartialEq, Eq)]
pub struct CreatorToken(String);

impl CreatorToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; CREATOR_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a token loaded from storage.
    pub fn from_stored(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token as presented to the creator.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a presented credential is exactly this token.
    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }
}

impl fmt::Debug for CreatorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CreatorToken(..)")
    }
}

/// Largest integer a JSON number carries exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A strictly positive, finite envelope amount.
///
/// Amounts are opaque quantities; no currency semantics are attached.
/// Fractional values are allowed. Whole values serialize as JSON integers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Amount(f64);

// `new` never admits NaN.
impl Eq for Amount {}

impl Amount {
    /// Create an amount, rejecting zero, negative, NaN and infinite values.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value > 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// The raw quantity.
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.fract() == 0.0 && self.0 <= MAX_EXACT_INTEGER {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

/// Get current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_id_hex_roundtrip() {
        let id = PacketId::from_bytes([0x42; 16]);
        let recovered = PacketId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_id_display_is_full_hex() {
        let id = EnvelopeId::from_bytes([0xab; 16]);
        assert_eq!(id.to_string(), "ab".repeat(16));
    }

    #[test]
    fn test_id_debug_is_short() {
        let id = EnvelopeId::from_bytes([0xcd; 16]);
        assert_eq!(format!("{:?}", id), "EnvelopeId(cdcdcdcd)");
    }

    #[test]
    fn test_id_from_str_rejects_garbage() {
        assert!("not-hex".parse::<PacketId>().is_err());
        assert!("abcd".parse::<PacketId>().is_err());
        assert!("00".repeat(16).parse::<PacketId>().is_ok());
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(EnvelopeId::generate(), EnvelopeId::generate());
        assert_ne!(PacketId::generate(), PacketId::generate());
    }

    #[test]
    fn test_id_serde_as_string() {
        let id = PacketId::from_bytes([0x01; 16]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(16)));
        let back: PacketId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_creator_token_matches_exactly() {
        let token = CreatorToken::generate();
        assert_eq!(token.as_str().len(), 64);
        assert!(token.matches(token.as_str()));
        assert!(!token.matches(&token.as_str().to_uppercase()));
        assert!(!token.matches(""));
    }

    #[test]
    fn test_creator_token_debug_redacted() {
        let token = CreatorToken::from_stored("secret");
        assert!(!format!("{:?}", token).contains("secret"));
    }

    #[test]
    fn test_amount_positive_only() {
        assert_eq!(Amount::new(50_000.0).map(Amount::get), Some(50_000.0));
        assert_eq!(Amount::new(10.5).map(Amount::get), Some(10.5));
        assert!(Amount::new(0.0).is_none());
        assert!(Amount::new(-0.0).is_none());
        assert!(Amount::new(-5.0).is_none());
        assert!(Amount::new(f64::NAN).is_none());
        assert!(Amount::new(f64::INFINITY).is_none());
    }

    #[test]
    fn test_amount_json() {
        let whole = Amount::new(50_000.0).unwrap();
        assert_eq!(serde_json::to_string(&whole).unwrap(), "50000");
        assert_eq!(whole.to_string(), "50000");

        let fractional = Amount::new(10.5).unwrap();
        assert_eq!(serde_json::to_string(&fractional).unwrap(), "10.5");

        let huge = Amount::new(1e300).unwrap();
        assert_eq!(serde_json::to_string(&huge).unwrap(), "1e300");
    }
}
