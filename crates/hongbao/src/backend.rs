//! Runtime backend selection.
//!
//! [`Backend`] wraps whichever store the configuration asked for, so the
//! service can be built once with a concrete type while the choice between
//! SQLite and memory happens at startup.

use async_trait::async_trait;
use tracing::{info, warn};

use hongbao_core::{ClaimOutcome, ClaimRequest, Envelope, Packet, PacketId};
use hongbao_store::{MemoryStore, SqliteStore, Store, StoreError};

use crate::config::{HongbaoConfig, StorageConfig};

/// A store chosen at runtime.
pub enum Backend {
    Sqlite(SqliteStore),
    Memory(MemoryStore),
}

impl Backend {
    /// Open exactly the configured store.
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        match config {
            StorageConfig::Memory => Ok(Backend::Memory(MemoryStore::new())),
            StorageConfig::Sqlite { path } => SqliteStore::open(path).map(Backend::Sqlite),
        }
    }

    /// Open the configured store, falling back to memory if allowed.
    pub fn open_with_fallback(config: &HongbaoConfig) -> Result<Self, StoreError> {
        match Self::open(&config.storage) {
            Ok(backend) => {
                info!(backend = backend.backend_name(), "storage ready");
                Ok(backend)
            }
            Err(e) if config.fallback_to_memory => {
                warn!(error = %e, "cannot open durable storage, using in-memory store");
                warn!("data will be lost on restart");
                Ok(Backend::Memory(MemoryStore::new()))
            }
            Err(e) => Err(e),
        }
    }

    /// Whether data survives a restart.
    pub fn is_durable(&self) -> bool {
        matches!(self, Backend::Sqlite(_))
    }

    fn store(&self) -> &dyn Store {
        match self {
            Backend::Sqlite(store) => store,
            Backend::Memory(store) => store,
        }
    }
}

#[async_trait]
impl Store for Backend {
    async fn create_packet(&self, packet: &Packet) -> hongbao_store::Result<()> {
        self.store().create_packet(packet).await
    }

    async fn get_packet(&self, id: &PacketId) -> hongbao_store::Result<Option<Packet>> {
        self.store().get_packet(id).await
    }

    async fn replace_envelopes(
        &self,
        id: &PacketId,
        envelopes: &[Envelope],
        at: i64,
    ) -> hongbao_store::Result<bool> {
        self.store().replace_envelopes(id, envelopes, at).await
    }

    async fn reset_packet(&self, id: &PacketId, at: i64) -> hongbao_store::Result<bool> {
        self.store().reset_packet(id, at).await
    }

    async fn deactivate_packet(&self, id: &PacketId, at: i64) -> hongbao_store::Result<bool> {
        self.store().deactivate_packet(id, at).await
    }

    async fn claim(&self, request: &ClaimRequest) -> hongbao_store::Result<ClaimOutcome> {
        self.store().claim(request).await
    }

    async fn health_check(&self) -> hongbao_store::Result<()> {
        self.store().health_check().await
    }

    fn backend_name(&self) -> &'static str {
        self.store().backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let backend = Backend::open(&StorageConfig::Memory).unwrap();
        assert!(!backend.is_durable());
        assert_eq!(backend.backend_name(), "memory");
    }

    #[test]
    fn test_open_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::open(&StorageConfig::Sqlite {
            path: dir.path().join("hongbao.db"),
        })
        .unwrap();
        assert!(backend.is_durable());
        assert_eq!(backend.backend_name(), "sqlite");
    }

    /// A path whose parent is a regular file cannot be opened.
    fn unopenable(dir: &tempfile::TempDir) -> HongbaoConfig {
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        HongbaoConfig::sqlite(blocker.join("hongbao.db"))
    }

    #[test]
    fn test_fallback_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let config = unopenable(&dir);

        let backend = Backend::open_with_fallback(&config).unwrap();
        assert!(!backend.is_durable());
    }

    #[test]
    fn test_no_fallback_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = unopenable(&dir);
        config.fallback_to_memory = false;

        assert!(Backend::open_with_fallback(&config).is_err());
    }
}
