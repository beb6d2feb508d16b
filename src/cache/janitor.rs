//! Age-based cache eviction
//!
//! Nothing in the crate schedules cleanup on its own. The janitor walks a
//! namespace, deletes entries whose last access is older than the horizon,
//! and reports what it removed; callers (the `prune_cache` tool, an
//! embedding application) decide when that happens.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::policy::ResourceCategory;
use crate::cache::registry::CacheStores;
use crate::cache::telemetry::human_size;
use crate::core::types::Result;

/// Default eviction horizon: one week without a read
pub const DEFAULT_MAX_AGE_SECS: u64 = 7 * 86_400;

/// What one cleanup pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted_count: usize,
    /// Logical bytes of the deleted entries
    pub deleted_bytes: u64,
}

impl CleanupReport {
    fn absorb(&mut self, other: CleanupReport) {
        self.deleted_count += other.deleted_count;
        self.deleted_bytes += other.deleted_bytes;
    }
}

/// Explicit, caller-invoked cache cleanup
pub struct EvictionJanitor {
    stores: Arc<CacheStores>,
}

impl EvictionJanitor {
    pub fn new(stores: Arc<CacheStores>) -> Self {
        Self { stores }
    }

    /// Delete entries in `category` not read for `max_age_secs`.
    pub async fn cleanup(
        &self,
        category: ResourceCategory,
        max_age_secs: u64,
    ) -> Result<CleanupReport> {
        let store = self.stores.store(category);
        let mut report = CleanupReport::default();

        for key in store.entries_older_than(max_age_secs).await {
            let size = store.entry_meta(&key).await.map(|m| m.size).unwrap_or(0);
            store.delete(&key).await?;
            report.deleted_count += 1;
            report.deleted_bytes += size;
        }

        if report.deleted_count > 0 {
            log::info!(
                "Evicted {} entries ({}) from {}",
                report.deleted_count,
                human_size(report.deleted_bytes),
                category.namespace()
            );
        }
        Ok(report)
    }

    /// Run `cleanup` over every namespace and sum the reports.
    pub async fn cleanup_all(&self, max_age_secs: u64) -> Result<CleanupReport> {
        let mut total = CleanupReport::default();
        for category in ResourceCategory::ALL {
            total.absorb(self.cleanup(category, max_age_secs).await?);
        }
        Ok(total)
    }

    /// Unconditionally wipe one namespace.
    pub async fn clear_all(&self, category: ResourceCategory) -> Result<()> {
        self.stores.store(category).clear().await?;
        log::info!("Cleared {}", category.namespace());
        Ok(())
    }

    /// Unconditionally wipe every namespace.
    pub async fn clear_everything(&self) -> Result<()> {
        for category in ResourceCategory::ALL {
            self.stores.store(category).clear().await?;
        }
        log::info!("Cleared all cache namespaces");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::registry::CacheConfig;
    use crate::cache::store::{BinaryStore, EntryMeta, unix_now};

    fn temp_janitor() -> (tempfile::TempDir, Arc<CacheStores>, EvictionJanitor) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CacheConfig {
            root: dir.path().to_path_buf(),
        };
        let stores = Arc::new(CacheStores::open(&config));
        let janitor = EvictionJanitor::new(stores.clone());
        (dir, stores, janitor)
    }

    async fn backdate(store: &BinaryStore, key: &str, size: u64, age_secs: u64) {
        let meta = EntryMeta {
            key: key.to_string(),
            size,
            last_accessed: unix_now() - age_secs,
        };
        tokio::fs::write(store.meta_path(key), serde_json::to_vec(&meta).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_deletes_only_stale_entries() {
        let (_dir, stores, janitor) = temp_janitor();
        let store = stores.store(ResourceCategory::AvatarModel);

        store.put("fresh", &vec![0u8; 10]).await.unwrap();
        store.put("stale", &vec![0u8; 40]).await.unwrap();
        backdate(store, "stale", 40, 10 * 86_400).await;

        let report = janitor
            .cleanup(ResourceCategory::AvatarModel, DEFAULT_MAX_AGE_SECS)
            .await
            .unwrap();

        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.deleted_bytes, 40);
        assert!(store.has("fresh").await);
        assert!(!store.has("stale").await);
    }

    #[tokio::test]
    async fn test_cleanup_with_nothing_stale_is_empty_report() {
        let (_dir, stores, janitor) = temp_janitor();
        let store = stores.store(ResourceCategory::Typeface);

        store.put("font", b"glyphs").await.unwrap();

        let report = janitor
            .cleanup(ResourceCategory::Typeface, DEFAULT_MAX_AGE_SECS)
            .await
            .unwrap();

        assert_eq!(report, CleanupReport::default());
        assert!(store.has("font").await);
    }

    #[tokio::test]
    async fn test_cleanup_all_sums_namespaces() {
        let (_dir, stores, janitor) = temp_janitor();

        let models = stores.store(ResourceCategory::AvatarModel);
        models.put("old-model", &vec![0u8; 100]).await.unwrap();
        backdate(models, "old-model", 100, 8 * 86_400).await;

        let clips = stores.store(ResourceCategory::Animation);
        clips.put("old-clip", &vec![0u8; 30]).await.unwrap();
        backdate(clips, "old-clip", 30, 9 * 86_400).await;
        clips.put("new-clip", &vec![0u8; 5]).await.unwrap();

        let report = janitor.cleanup_all(DEFAULT_MAX_AGE_SECS).await.unwrap();

        assert_eq!(report.deleted_count, 2);
        assert_eq!(report.deleted_bytes, 130);
        assert!(clips.has("new-clip").await);
    }

    #[tokio::test]
    async fn test_clear_all_wipes_only_that_namespace() {
        let (_dir, stores, janitor) = temp_janitor();

        stores
            .store(ResourceCategory::AvatarModel)
            .put("m", b"model")
            .await
            .unwrap();
        stores
            .store(ResourceCategory::Animation)
            .put("c", b"clip")
            .await
            .unwrap();

        janitor.clear_all(ResourceCategory::AvatarModel).await.unwrap();

        assert!(!stores.store(ResourceCategory::AvatarModel).has("m").await);
        assert!(stores.store(ResourceCategory::Animation).has("c").await);
    }

    #[tokio::test]
    async fn test_clear_everything_empties_the_cache() {
        let (_dir, stores, janitor) = temp_janitor();

        for category in ResourceCategory::ALL {
            stores.store(category).put("k", b"v").await.unwrap();
        }

        janitor.clear_everything().await.unwrap();

        let report = stores.stats().await;
        assert_eq!(report.total_count(), 0);
        assert_eq!(report.total_bytes(), 0);
    }
}
