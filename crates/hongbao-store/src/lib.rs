//! # Hongbao Store
//!
//! Storage abstraction for Hongbao. Provides a trait-based interface for
//! packet persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts packet storage behind the [`Store`] trait,
//! so the service never knows which backend it runs on. [`SqliteStore`] is
//! durable; [`MemoryStore`] is volatile and serves as the fallback.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage
//! - [`StoreError`] - Storage faults (never claim races)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hongbao_core::{now_millis, ClaimRequest, EnvelopeSpec, Packet};
//! use hongbao_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("hongbao.db").unwrap();
//!
//!     let packet = Packet::from_specs(&[EnvelopeSpec::new(88, "koi")], now_millis()).unwrap();
//!     store.create_packet(&packet).await.unwrap();
//!
//!     let request = ClaimRequest::new(packet.envelopes[0].id, now_millis());
//!     let outcome = store.claim(&request).await.unwrap();
//!     assert!(outcome.is_claimed());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Single winner**: claims on one envelope are linearizable in both backends
//! - **All-or-nothing writes**: create, replace and reset never leave partial state
//! - **Soft delete**: deactivated packets vanish from reads and claims but stay on disk

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::Store;
