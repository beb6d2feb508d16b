//! Fetch-or-cache asset loading
//!
//! `AssetLoader` front-ends the per-category stores: a hit is served from
//! disk, a miss is fetched over HTTP and persisted when the policy says the
//! payload is worth keeping. Persistence failures degrade to a log line so a
//! full cache disk never blocks an avatar from loading.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::cache::policy::{self, ResourceCategory};
use crate::cache::registry::CacheStores;
use crate::cache::telemetry::{LoaderStats, human_size};
use crate::core::error::Error;
use crate::core::types::Result;

/// Cache-first asset fetcher shared by all loader call sites
pub struct AssetLoader {
    stores: Arc<CacheStores>,
    http: reqwest::Client,
    hits: AtomicU64,
    misses: AtomicU64,
    bytes_fetched: AtomicU64,
    bytes_served_from_cache: AtomicU64,
}

impl AssetLoader {
    /// Create a loader over the given store registry
    pub fn new(stores: Arc<CacheStores>) -> Self {
        Self {
            stores,
            http: reqwest::Client::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bytes_fetched: AtomicU64::new(0),
            bytes_served_from_cache: AtomicU64::new(0),
        }
    }

    /// Store registry this loader reads and writes
    pub fn stores(&self) -> &CacheStores {
        &self.stores
    }

    /// Resolve `url` through the `category` store, fetching on a miss.
    ///
    /// A fetched payload is persisted only when `policy::decide` approves it
    /// for the category and size; a failed `put` is logged and the bytes are
    /// still returned. Network failures and non-success statuses surface as
    /// `Error::Network` and are never retried here.
    pub async fn load_with_cache(&self, url: &str, category: ResourceCategory) -> Result<Vec<u8>> {
        let store = self.stores.store(category);
        let started = Instant::now();

        if let Some(bytes) = store.get(url).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.bytes_served_from_cache
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);
            log::info!(
                "Cache hit: {} {} ({}) in {:.1}ms",
                category.namespace(),
                url,
                human_size(bytes.len() as u64),
                started.elapsed().as_secs_f64() * 1000.0
            );
            return Ok(bytes);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let bytes = self.fetch(url).await?;
        self.bytes_fetched
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        log::info!(
            "Downloaded {} ({}) in {:.1}ms",
            url,
            human_size(bytes.len() as u64),
            started.elapsed().as_secs_f64() * 1000.0
        );

        if policy::decide(category, bytes.len() as u64).persist {
            if let Err(e) = store.put(url, &bytes).await {
                log::warn!("Failed to persist {} in {}: {}", url, category.namespace(), e);
            }
        } else {
            log::debug!(
                "Not persisting {} ({} below threshold for {})",
                url,
                human_size(bytes.len() as u64),
                category.namespace()
            );
        }

        Ok(bytes)
    }

    /// Snapshot of the hit/miss and byte counters
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
            bytes_served_from_cache: self.bytes_served_from_cache.load(Ordering::Relaxed),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("GET {} returned {}", url, status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Reading body of {} failed: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::registry::CacheConfig;

    fn temp_loader() -> (tempfile::TempDir, AssetLoader) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CacheConfig {
            root: dir.path().to_path_buf(),
        };
        let loader = AssetLoader::new(Arc::new(CacheStores::open(&config)));
        (dir, loader)
    }

    #[tokio::test]
    async fn test_miss_fetches_and_persists_model() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![3u8; 1024];
        let mock = server
            .mock("GET", "/model.vrm")
            .with_status(200)
            .with_body(body.clone())
            .create();

        let (_dir, loader) = temp_loader();
        let url = format!("{}/model.vrm", server.url());

        let bytes = loader
            .load_with_cache(&url, ResourceCategory::AvatarModel)
            .await
            .unwrap();

        assert_eq!(bytes, body);
        mock.assert();
        assert!(
            loader
                .stores()
                .store(ResourceCategory::AvatarModel)
                .has(&url)
                .await
        );

        let stats = loader.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.bytes_fetched, 1024);
        assert_eq!(stats.bytes_served_from_cache, 0);
    }

    #[tokio::test]
    async fn test_second_load_is_served_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![9u8; 2048];
        let mock = server
            .mock("GET", "/idle.vrma")
            .with_status(200)
            .with_body(body.clone())
            .expect(1)
            .create();

        let (_dir, loader) = temp_loader();
        let url = format!("{}/idle.vrma", server.url());

        let first = loader
            .load_with_cache(&url, ResourceCategory::Animation)
            .await
            .unwrap();
        let second = loader
            .load_with_cache(&url, ResourceCategory::Animation)
            .await
            .unwrap();

        assert_eq!(first, second);
        mock.assert();

        let stats = loader.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.bytes_fetched, 2048);
        assert_eq!(stats.bytes_served_from_cache, 2048);
        assert_eq!(stats.requests(), 2);
    }

    #[tokio::test]
    async fn test_non_success_status_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/gone.vrm").with_status(404).create();

        let (_dir, loader) = temp_loader();
        let url = format!("{}/gone.vrm", server.url());

        let err = loader
            .load_with_cache(&url, ResourceCategory::AvatarModel)
            .await
            .unwrap_err();

        assert!(err.is_network(), "expected network error, got {:?}", err);
        mock.assert();
        assert!(
            !loader
                .stores()
                .store(ResourceCategory::AvatarModel)
                .has(&url)
                .await
        );

        let stats = loader.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.bytes_fetched, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let (_dir, loader) = temp_loader();

        let err = loader
            .load_with_cache("http://127.0.0.1:1/unreachable", ResourceCategory::Typeface)
            .await
            .unwrap_err();

        assert!(err.is_network(), "expected network error, got {:?}", err);
    }

    #[tokio::test]
    async fn test_small_generic_asset_is_not_persisted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tiny.json")
            .with_status(200)
            .with_body(b"{}".to_vec())
            .expect(2)
            .create();

        let (_dir, loader) = temp_loader();
        let url = format!("{}/tiny.json", server.url());

        loader
            .load_with_cache(&url, ResourceCategory::GenericAsset)
            .await
            .unwrap();
        assert!(
            !loader
                .stores()
                .store(ResourceCategory::GenericAsset)
                .has(&url)
                .await
        );

        // Below the persistence threshold, so every load goes to the network.
        loader
            .load_with_cache(&url, ResourceCategory::GenericAsset)
            .await
            .unwrap();
        mock.assert();

        let stats = loader.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn test_large_background_image_is_persisted() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![7u8; 300 * 1024];
        let mock = server
            .mock("GET", "/room.png")
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create();

        let (_dir, loader) = temp_loader();
        let url = format!("{}/room.png", server.url());

        loader
            .load_with_cache(&url, ResourceCategory::BackgroundImage)
            .await
            .unwrap();
        loader
            .load_with_cache(&url, ResourceCategory::BackgroundImage)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(loader.stats().hits, 1);
    }
}
