//! # Hongbao
//!
//! The unified API for Hongbao: red-envelope packets where each envelope
//! can be opened by exactly one claimant.
//!
//! ## Overview
//!
//! A creator submits a batch of envelope specs (amount plus image) and gets
//! back a packet and a secret creator token. Anyone with the packet id can
//! view it and claim envelopes; only the token holder sees unopened amounts
//! or edits the packet.
//!
//! - **Claims**: exactly one winner per envelope, even under concurrent load
//! - **Views**: sealed amounts are redacted for everyone but the creator
//! - **Edits**: replace every envelope at once, discarding prior claims
//! - **Storage**: SQLite when possible, in-memory fallback when not
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hongbao::{EnvelopeSpec, Hongbao, HongbaoConfig};
//!
//! async fn example() {
//!     let hongbao = Hongbao::open(&HongbaoConfig::from_env().unwrap()).unwrap();
//!
//!     let created = hongbao
//!         .create_packet(&[EnvelopeSpec::new(8800, "dragon"), EnvelopeSpec::new(600, "koi")])
//!         .await
//!         .unwrap();
//!
//!     let packet_id = created.packet.id;
//!     let envelope_id = created.packet.envelopes[0].id;
//!
//!     let outcome = hongbao.claim(&packet_id, &envelope_id, None).await.unwrap();
//!     assert!(outcome.is_claimed());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `hongbao::core` - Packets, envelopes, claims and views
//! - `hongbao::store` - Storage abstraction, SQLite and memory

pub mod backend;
pub mod config;
pub mod error;
pub mod service;

// Re-export component crates
pub use hongbao_core as core;
pub use hongbao_store as store;

// Re-export main types for convenience
pub use backend::Backend;
pub use config::{ConfigError, HongbaoConfig, StorageConfig};
pub use error::{ErrorBody, HongbaoError, Result};
pub use service::{CreatedPacket, HealthReport, Hongbao};

// Re-export commonly used core types
pub use hongbao_core::{
    ClaimOutcome, ClaimResponse, ClaimedEnvelope, EnvelopeId, EnvelopeSpec, EnvelopeView,
    PacketId, PacketView,
};
pub use hongbao_store::{MemoryStore, SqliteStore, Store};
