//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use hongbao::{ClaimOutcome, CreatedPacket, Hongbao};
use hongbao_core::{now_millis, EnvelopeSpec, Packet};
use hongbao_store::{MemoryStore, SqliteStore, Store};

/// Specs with the given amounts and numbered skins.
pub fn specs(amounts: &[i64]) -> Vec<EnvelopeSpec> {
    amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| EnvelopeSpec::new(*amount as f64, format!("skin-{i}")))
        .collect()
}

/// A fresh, unsaved packet with the given amounts.
pub fn make_packet(amounts: &[i64]) -> Packet {
    Packet::from_specs(&specs(amounts), now_millis()).expect("fixture amounts must be positive")
}

/// A test fixture wrapping a service over some store.
pub struct TestFixture<S: Store> {
    pub hongbao: Hongbao<S>,
}

impl TestFixture<MemoryStore> {
    /// A fixture over the in-memory store.
    pub fn memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl TestFixture<SqliteStore> {
    /// A fixture over an in-memory SQLite database.
    pub fn sqlite() -> Self {
        Self::new(SqliteStore::open_memory().expect("in-memory sqlite"))
    }
}

impl<S: Store> TestFixture<S> {
    pub fn new(store: S) -> Self {
        Self {
            hongbao: Hongbao::new(store),
        }
    }

    /// Create a packet with the given amounts.
    pub async fn create(&self, amounts: &[i64]) -> CreatedPacket {
        self.hongbao
            .create_packet(&specs(amounts))
            .await
            .expect("fixture packet must be valid")
    }

    /// Claim the `n`th envelope of a created packet, anonymously.
    pub async fn claim_nth(&self, created: &CreatedPacket, n: usize) -> ClaimOutcome {
        let envelope = created.packet.envelopes[n].id;
        self.hongbao
            .claim(&created.packet.id, &envelope, None)
            .await
            .expect("claim must not fault")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specs_numbered() {
        let specs = specs(&[1, 2]);
        assert_eq!(specs[0], EnvelopeSpec::new(1, "skin-0"));
        assert_eq!(specs[1], EnvelopeSpec::new(2, "skin-1"));
    }

    #[test]
    fn test_make_packet() {
        let packet = make_packet(&[5, 6, 7]);
        assert_eq!(packet.envelopes.len(), 3);
        assert_eq!(packet.opened_count(), 0);
    }

    #[tokio::test]
    async fn test_fixture_claim() {
        let fixture = TestFixture::sqlite();
        let created = fixture.create(&[10, 20]).await;

        assert!(fixture.claim_nth(&created, 1).await.is_claimed());
        assert_eq!(fixture.claim_nth(&created, 1).await, ClaimOutcome::AlreadyOpened);
    }
}
