//! Run the store conformance suite against every backend.

use std::sync::Arc;

use hongbao::{Backend, HongbaoConfig};
use hongbao_store::{MemoryStore, SqliteStore};
use hongbao_testkit::conformance;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_store_conforms() {
    conformance::run_all(Arc::new(MemoryStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_memory_conforms() {
    conformance::run_all(Arc::new(SqliteStore::open_memory().unwrap())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_file_conforms() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("conformance.db")).unwrap();
    conformance::run_all(Arc::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_configured_backend_conforms() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Backend::open_with_fallback(&HongbaoConfig::sqlite(dir.path().join("h.db"))).unwrap();
    assert!(backend.is_durable());
    conformance::run_all(Arc::new(backend)).await;
}

#[tokio::test]
async fn test_view_json_never_leaks_secrets() {
    let fixture = hongbao_testkit::TestFixture::sqlite();
    let created = fixture.create(&[50_000, 100_000]).await;
    fixture.claim_nth(&created, 0).await;

    let public = fixture.hongbao.get_packet(&created.packet.id, None).await.unwrap();
    let json = serde_json::to_string(&public).unwrap();

    assert!(!json.contains(&created.creator_token));
    assert!(json.contains("50000"));
    assert!(!json.contains("100000"));
}
