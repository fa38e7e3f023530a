//! Cache worker lifecycle tests with an in-memory origin.

use async_trait::async_trait;
use medassist::cache::CacheStorage;
use medassist::config::CacheConfig;
use medassist::fetcher::{FetchError, Fetcher};
use medassist::models::StoredResponse;
use medassist::worker::{CacheManifest, CacheWorker, FetchSource, WorkerState};
use medassist::{db, migrate};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ─── Test Fetcher ───────────────────────────────────────────────────

/// Serves fixed bodies and records every URL it was asked for.
#[derive(Default)]
struct MemoryOrigin {
    pages: HashMap<String, StoredResponse>,
    unreachable: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MemoryOrigin {
    fn with_assets(assets: &[&str]) -> Self {
        let mut origin = Self::default();
        for url in assets {
            origin.page(url, 200, &format!("body of {}", url));
        }
        origin
    }

    fn page(&mut self, url: &str, status: u16, body: &str) {
        self.pages.insert(
            url.to_string(),
            StoredResponse {
                url: url.to_string(),
                status,
                content_type: Some("text/plain".to_string()),
                body: body.as_bytes().to_vec(),
            },
        );
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for MemoryOrigin {
    async fn fetch(&self, url: &str) -> Result<StoredResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.unreachable.contains(url) {
            return Err(FetchError::Network {
                url: url.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.pages.get(url).cloned().unwrap_or(StoredResponse {
            url: url.to_string(),
            status: 404,
            content_type: None,
            body: Vec::new(),
        }))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

const ASSETS: [&str; 5] = [
    "/",
    "/index.html",
    "/manifest.json",
    "/public/icon-192.png",
    "/public/icon-512.png",
];

fn manifest(version: &str) -> CacheManifest {
    CacheManifest {
        prefix: "medassist".to_string(),
        version: version.to_string(),
        assets: ASSETS.iter().map(|s| s.to_string()).collect(),
    }
}

async fn storage(tmp: &TempDir) -> CacheStorage {
    let config = CacheConfig {
        db_path: tmp.path().join("cache.sqlite"),
        ..CacheConfig::default()
    };
    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    CacheStorage::new(pool)
}

// ─── install ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_install_caches_exactly_the_manifest() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let origin = Arc::new(MemoryOrigin::with_assets(&ASSETS));
    let worker = CacheWorker::new(manifest("v1"), storage.clone(), origin.clone());

    assert_eq!(worker.state(), WorkerState::Parsed);
    let count = worker.install().await.unwrap();
    assert_eq!(count, 5);
    assert_eq!(worker.state(), WorkerState::Installed);

    assert_eq!(storage.keys().await.unwrap(), vec!["medassist-v1".to_string()]);
    let bucket = storage.open("medassist-v1").await.unwrap();
    let mut expected: Vec<String> = ASSETS.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(bucket.urls().await.unwrap(), expected);

    let icon = bucket.match_url("/public/icon-192.png").await.unwrap().unwrap();
    assert_eq!(icon.body, b"body of /public/icon-192.png");
}

#[tokio::test]
async fn test_install_is_all_or_nothing_on_network_error() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let mut origin = MemoryOrigin::with_assets(&ASSETS);
    origin.unreachable.insert("/public/icon-512.png".to_string());
    let worker = CacheWorker::new(manifest("v1"), storage.clone(), Arc::new(origin));

    let err = worker.install().await.unwrap_err();
    assert!(format!("{:#}", err).contains("icon-512"));
    assert_eq!(worker.state(), WorkerState::Redundant);

    let bucket = storage.open("medassist-v1").await.unwrap();
    assert!(bucket.is_empty().await.unwrap());
    assert!(storage.match_url("/").await.unwrap().is_none());
}

#[tokio::test]
async fn test_install_fails_on_error_status() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let mut origin = MemoryOrigin::with_assets(&ASSETS);
    origin.page("/manifest.json", 500, "oops");
    let worker = CacheWorker::new(manifest("v1"), storage.clone(), Arc::new(origin));

    let err = worker.install().await.unwrap_err();
    assert!(format!("{:#}", err).contains("returned status 500"));

    let bucket = storage.open("medassist-v1").await.unwrap();
    assert_eq!(bucket.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_install_can_be_retried_after_failure() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;

    let mut broken = MemoryOrigin::with_assets(&ASSETS);
    broken.unreachable.insert("/".to_string());
    let worker = CacheWorker::new(manifest("v1"), storage.clone(), Arc::new(broken));
    assert!(worker.install().await.is_err());

    let worker = CacheWorker::new(
        manifest("v1"),
        storage.clone(),
        Arc::new(MemoryOrigin::with_assets(&ASSETS)),
    );
    assert_eq!(worker.install().await.unwrap(), 5);
}

// ─── activate ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_activate_removes_stale_buckets() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let origin = Arc::new(MemoryOrigin::with_assets(&ASSETS));

    let v1 = CacheWorker::new(manifest("v1"), storage.clone(), origin.clone());
    v1.install().await.unwrap();
    v1.activate().await.unwrap();
    storage.open("unrelated").await.unwrap();

    let v2 = CacheWorker::new(manifest("v2"), storage.clone(), origin.clone());
    v2.install().await.unwrap();
    let mut deleted = v2.activate().await.unwrap();
    deleted.sort();

    assert_eq!(deleted, vec!["medassist-v1".to_string(), "unrelated".to_string()]);
    assert_eq!(storage.keys().await.unwrap(), vec!["medassist-v2".to_string()]);
    assert_eq!(v2.state(), WorkerState::Activated);
}

#[tokio::test]
async fn test_activate_requires_install() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let worker = CacheWorker::new(
        manifest("v1"),
        storage,
        Arc::new(MemoryOrigin::with_assets(&ASSETS)),
    );
    assert!(worker.activate().await.is_err());
    assert_eq!(worker.state(), WorkerState::Parsed);
}

// ─── fetch ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_hit_never_reaches_network() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let origin = Arc::new(MemoryOrigin::with_assets(&ASSETS));
    let worker = CacheWorker::new(manifest("v1"), storage, origin.clone());
    worker.install().await.unwrap();
    let after_install = origin.total_calls();

    let (resp, source) = worker.fetch("/index.html").await.unwrap();
    assert_eq!(source, FetchSource::Cache);
    assert_eq!(resp.body, b"body of /index.html");
    assert_eq!(origin.total_calls(), after_install);
}

#[tokio::test]
async fn test_fetch_miss_reaches_network_once() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let mut origin = MemoryOrigin::with_assets(&ASSETS);
    origin.page("/script.js", 200, "askAssistant()");
    let origin = Arc::new(origin);
    let worker = CacheWorker::new(manifest("v1"), storage.clone(), origin.clone());
    worker.install().await.unwrap();

    let (resp, source) = worker.fetch("/script.js").await.unwrap();
    assert_eq!(source, FetchSource::Network);
    assert_eq!(resp.body, b"askAssistant()");
    assert_eq!(origin.calls_for("/script.js"), 1);

    // Network responses are not written back.
    assert!(storage.match_url("/script.js").await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_passes_network_errors_through() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let mut origin = MemoryOrigin::default();
    origin.unreachable.insert("/api/offline".to_string());
    let origin = Arc::new(origin);
    let worker = CacheWorker::new(manifest("v1"), storage, origin.clone());

    let (resp, _) = worker.fetch("/nope").await.unwrap();
    assert_eq!(resp.status, 404);

    let err = worker.fetch("/api/offline").await.unwrap_err();
    assert!(matches!(err, FetchError::Network { .. }));
    assert_eq!(origin.calls_for("/api/offline"), 1);
}

#[tokio::test]
async fn test_fetch_matches_exact_url_only() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let origin = Arc::new(MemoryOrigin::with_assets(&ASSETS));
    let worker = CacheWorker::new(manifest("v1"), storage, origin.clone());
    worker.install().await.unwrap();

    let (_, source) = worker.fetch("/index.html?v=2").await.unwrap();
    assert_eq!(source, FetchSource::Network);
    assert_eq!(origin.calls_for("/index.html?v=2"), 1);
}

// ─── storage ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_storage_searches_buckets_in_creation_order() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;

    let older = storage.open("a-old").await.unwrap();
    let newer = storage.open("0-new").await.unwrap();
    for (bucket, body) in [(&newer, "new"), (&older, "old")] {
        bucket
            .put(&StoredResponse {
                url: "/".to_string(),
                status: 200,
                content_type: None,
                body: body.as_bytes().to_vec(),
            })
            .await
            .unwrap();
    }

    let hit = storage.match_url("/").await.unwrap().unwrap();
    assert_eq!(hit.body, b"old");

    assert!(storage.delete("a-old").await.unwrap());
    assert!(!storage.delete("a-old").await.unwrap());
    let hit = storage.match_url("/").await.unwrap().unwrap();
    assert_eq!(hit.body, b"new");
}

#[tokio::test]
async fn test_install_counts_only_what_it_committed() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let origin = Arc::new(MemoryOrigin::with_assets(&ASSETS));

    let full = CacheWorker::new(manifest("v1"), storage.clone(), origin.clone());
    assert_eq!(full.install().await.unwrap(), 5);

    // Same bucket name, shorter asset list: old entries stay but are not counted.
    let mut short = manifest("v1");
    short.assets = vec!["/".to_string(), "/index.html".to_string()];
    let worker = CacheWorker::new(short, storage.clone(), origin);
    assert_eq!(worker.install().await.unwrap(), 2);

    let bucket = storage.open("medassist-v1").await.unwrap();
    assert_eq!(bucket.len().await.unwrap(), 5);
}

#[tokio::test]
async fn test_deleting_bucket_removes_its_entries() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp).await;
    let worker = CacheWorker::new(
        manifest("v1"),
        storage.clone(),
        Arc::new(MemoryOrigin::with_assets(&ASSETS)),
    );
    worker.install().await.unwrap();

    assert!(storage.delete("medassist-v1").await.unwrap());

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries")
        .fetch_one(storage.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert!(storage.match_url("/").await.unwrap().is_none());
}
