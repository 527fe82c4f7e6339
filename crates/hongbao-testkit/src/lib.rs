//! # Hongbao Testkit
//!
//! Testing utilities for Hongbao.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Conformance checks**: Behavior every [`Store`](hongbao_store::Store) must show
//! - **Generators**: Proptest strategies for envelope specs and packets
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Conformance
//!
//! A new backend is checked by running the whole suite against it:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hongbao_store::MemoryStore;
//! use hongbao_testkit::conformance;
//!
//! async fn check() {
//!     conformance::run_all(Arc::new(MemoryStore::new())).await;
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use hongbao_testkit::generators::{packet_from_params, PacketParams};
//!
//! proptest! {
//!     #[test]
//!     fn packets_start_sealed(params: PacketParams) {
//!         let packet = packet_from_params(&params);
//!         prop_assert_eq!(packet.opened_count(), 0);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust,no_run
//! use hongbao_testkit::fixtures::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::memory();
//!     let created = fixture.create(&[50_000, 100_000]).await;
//!     let outcome = fixture.claim_nth(&created, 0).await;
//!     assert!(outcome.is_claimed());
//! }
//! ```

pub mod conformance;
pub mod fixtures;
pub mod generators;

pub use fixtures::{make_packet, specs, TestFixture};
pub use generators::{packet_from_params, PacketParams};
