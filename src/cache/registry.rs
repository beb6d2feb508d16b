//! Per-category store registry
//!
//! One `BinaryStore` per `ResourceCategory`, constructed once from a
//! `CacheConfig` and passed by reference (or `Arc`) to whoever needs a
//! store. Category dispatch is explicit: every call site names the
//! category it is working with and gets exactly that namespace back.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cache::policy::ResourceCategory;
use crate::cache::store::BinaryStore;

/// Location of the on-disk cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory under which each namespace gets its own subdirectory
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("kagami-cache"),
        }
    }
}

/// Snapshot of one namespace for reporting
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub namespace: &'static str,
    pub count: usize,
    pub total_bytes: u64,
}

/// Snapshot of the whole cache, one row per namespace
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub namespaces: Vec<NamespaceStats>,
}

impl CacheReport {
    /// Entries across all namespaces
    pub fn total_count(&self) -> usize {
        self.namespaces.iter().map(|n| n.count).sum()
    }

    /// Logical bytes across all namespaces
    pub fn total_bytes(&self) -> u64 {
        self.namespaces.iter().map(|n| n.total_bytes).sum()
    }
}

/// The constructed-once set of per-category stores
pub struct CacheStores {
    root: PathBuf,
    avatar_models: BinaryStore,
    animations: BinaryStore,
    runtime_binaries: BinaryStore,
    typefaces: BinaryStore,
    generic_assets: BinaryStore,
    background_images: BinaryStore,
}

impl CacheStores {
    /// Build one store handle per category under `config.root`.
    ///
    /// Directories are created lazily by the first write in each namespace,
    /// so opening a registry never touches the filesystem.
    pub fn open(config: &CacheConfig) -> Self {
        let store_for =
            |category: ResourceCategory| BinaryStore::open(&config.root, category.namespace());
        Self {
            root: config.root.clone(),
            avatar_models: store_for(ResourceCategory::AvatarModel),
            animations: store_for(ResourceCategory::Animation),
            runtime_binaries: store_for(ResourceCategory::RuntimeBinary),
            typefaces: store_for(ResourceCategory::Typeface),
            generic_assets: store_for(ResourceCategory::GenericAsset),
            background_images: store_for(ResourceCategory::BackgroundImage),
        }
    }

    /// Root directory all namespaces live under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The store serving `category`
    pub fn store(&self, category: ResourceCategory) -> &BinaryStore {
        match category {
            ResourceCategory::AvatarModel => &self.avatar_models,
            ResourceCategory::Animation => &self.animations,
            ResourceCategory::RuntimeBinary => &self.runtime_binaries,
            ResourceCategory::Typeface => &self.typefaces,
            ResourceCategory::GenericAsset => &self.generic_assets,
            ResourceCategory::BackgroundImage => &self.background_images,
        }
    }

    /// Per-namespace entry counts and sizes
    pub async fn stats(&self) -> CacheReport {
        let mut namespaces = Vec::with_capacity(ResourceCategory::ALL.len());
        for category in ResourceCategory::ALL {
            let stats = self.store(category).size().await;
            namespaces.push(NamespaceStats {
                namespace: category.namespace(),
                count: stats.count,
                total_bytes: stats.total_bytes,
            });
        }
        CacheReport { namespaces }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_stores() -> (tempfile::TempDir, CacheStores) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CacheConfig {
            root: dir.path().to_path_buf(),
        };
        (dir, CacheStores::open(&config))
    }

    #[test]
    fn test_store_matches_category_namespace() {
        let (_dir, stores) = temp_stores();
        for category in ResourceCategory::ALL {
            assert_eq!(stores.store(category).namespace(), category.namespace());
        }
    }

    #[tokio::test]
    async fn test_same_key_is_independent_per_category() {
        let (_dir, stores) = temp_stores();
        let key = "https://example.com/shared";

        stores
            .store(ResourceCategory::AvatarModel)
            .put(key, b"model")
            .await
            .unwrap();
        stores
            .store(ResourceCategory::Animation)
            .put(key, b"clip")
            .await
            .unwrap();

        assert_eq!(
            stores.store(ResourceCategory::AvatarModel).get(key).await,
            Some(b"model".to_vec())
        );
        assert_eq!(
            stores.store(ResourceCategory::Animation).get(key).await,
            Some(b"clip".to_vec())
        );
        assert!(!stores.store(ResourceCategory::Typeface).has(key).await);
    }

    #[tokio::test]
    async fn test_stats_aggregates_namespaces() {
        let (_dir, stores) = temp_stores();

        stores
            .store(ResourceCategory::AvatarModel)
            .put("a", &vec![0u8; 10])
            .await
            .unwrap();
        stores
            .store(ResourceCategory::AvatarModel)
            .put("b", &vec![0u8; 20])
            .await
            .unwrap();
        stores
            .store(ResourceCategory::Typeface)
            .put("c", &vec![0u8; 5])
            .await
            .unwrap();

        let report = stores.stats().await;
        assert_eq!(report.namespaces.len(), ResourceCategory::ALL.len());
        assert_eq!(report.total_count(), 3);
        assert_eq!(report.total_bytes(), 35);

        let models = report
            .namespaces
            .iter()
            .find(|n| n.namespace == "avatar-models")
            .unwrap();
        assert_eq!(models.count, 2);
        assert_eq!(models.total_bytes, 30);
    }

    #[test]
    fn test_default_config_has_relative_root() {
        let config = CacheConfig::default();
        assert!(config.root.is_relative());
    }
}
