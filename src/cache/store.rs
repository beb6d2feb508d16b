//! Durable per-namespace blob store
//!
//! Each `BinaryStore` owns one namespace directory. An entry is a pair of
//! files named by the SHA-256 of the key: `<hash>.bin` holds the payload,
//! LZ4-compressed with a prepended size, and `<hash>.meta` holds JSON
//! metadata (original key, logical size, last access time). Keys are URL
//! strings; hashing keeps arbitrary keys filesystem-safe.
//!
//! The store is a best-effort cache, not a system of record: last writer
//! wins per key, corrupt entries are purged and reported as misses, and a
//! failed access-time refresh never fails the read.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::error::Error;
use crate::core::types::Result;

/// Aggregate statistics for one namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of entries
    pub count: usize,
    /// Sum of logical (uncompressed) entry sizes in bytes
    pub total_bytes: u64,
}

/// Per-entry metadata persisted alongside the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EntryMeta {
    pub(crate) key: String,
    pub(crate) size: u64,
    /// Unix seconds of the last successful read (or the write that created it)
    pub(crate) last_accessed: u64,
}

/// Keyed durable blob store for one resource namespace
pub struct BinaryStore {
    namespace: String,
    dir: PathBuf,
}

impl BinaryStore {
    /// Open a store handle for `namespace` under `root`.
    ///
    /// No IO happens here; the namespace directory is created lazily on the
    /// first write.
    pub fn open(root: &Path, namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            dir: root.join(namespace),
        }
    }

    /// Namespace this store serves
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Directory backing this namespace
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check whether an entry exists for `key`. Never errors.
    pub async fn has(&self, key: &str) -> bool {
        let payload_ok = tokio::fs::try_exists(self.payload_path(key)).await.unwrap_or(false);
        let meta_ok = tokio::fs::try_exists(self.meta_path(key)).await.unwrap_or(false);
        payload_ok && meta_ok
    }

    /// Read the bytes stored for `key`, refreshing its access time.
    ///
    /// Returns `None` on a miss. A corrupt entry (unreadable metadata,
    /// truncated or undecodable payload) is purged, logged, and reported as
    /// a miss so the caller falls back to a fresh fetch.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let meta = match self.entry_meta(key).await {
            Some(meta) => meta,
            None => return None,
        };

        let compressed = match tokio::fs::read(self.payload_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("{}: unreadable payload for {:?}: {}", self.namespace, key, e);
                self.purge(key).await;
                return None;
            }
        };

        let bytes = match lz4_flex::decompress_size_prepended(&compressed) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("{}: corrupt payload for {:?}: {}", self.namespace, key, e);
                self.purge(key).await;
                return None;
            }
        };

        if bytes.len() as u64 != meta.size {
            log::warn!(
                "{}: size mismatch for {:?} (meta {} vs payload {})",
                self.namespace,
                key,
                meta.size,
                bytes.len()
            );
            self.purge(key).await;
            return None;
        }

        // Refresh the access time; failure to do so must not fail the read.
        let refreshed = EntryMeta {
            last_accessed: unix_now(),
            ..meta
        };
        if let Err(e) = self.write_meta(key, &refreshed).await {
            log::debug!("{}: access-time refresh failed for {:?}: {}", self.namespace, key, e);
        }

        Some(bytes)
    }

    /// Insert or overwrite the entry for `key`. Last writer wins.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Storage(format!("{}: create dir failed: {}", self.namespace, e)))?;

        let compressed = lz4_flex::compress_prepend_size(bytes);
        tokio::fs::write(self.payload_path(key), &compressed)
            .await
            .map_err(|e| Error::Storage(format!("{}: write {:?} failed: {}", self.namespace, key, e)))?;

        let meta = EntryMeta {
            key: key.to_string(),
            size: bytes.len() as u64,
            last_accessed: unix_now(),
        };
        self.write_meta(key, &meta).await
    }

    /// Delete the entry for `key`. No-op if absent.
    pub async fn delete(&self, key: &str) -> Result<()> {
        for path in [self.payload_path(key), self.meta_path(key)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::Storage(format!(
                        "{}: delete {:?} failed: {}",
                        self.namespace, key, e
                    )));
                }
            }
        }
        Ok(())
    }

    /// Entry count and total logical bytes for this namespace
    pub async fn size(&self) -> StoreStats {
        let mut stats = StoreStats::default();
        for meta in self.scan_metas().await {
            stats.count += 1;
            stats.total_bytes += meta.size;
        }
        stats
    }

    /// Keys of entries whose last access is strictly older than `max_age_secs`
    pub async fn entries_older_than(&self, max_age_secs: u64) -> Vec<String> {
        let horizon = unix_now().saturating_sub(max_age_secs);
        self.scan_metas()
            .await
            .into_iter()
            .filter(|meta| meta.last_accessed < horizon)
            .map(|meta| meta.key)
            .collect()
    }

    /// Remove every entry in this namespace
    pub(crate) async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("{}: clear failed: {}", self.namespace, e))),
        }
    }

    /// Read the metadata for `key`, if the entry exists and decodes
    pub(crate) async fn entry_meta(&self, key: &str) -> Option<EntryMeta> {
        let raw = match tokio::fs::read(self.meta_path(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("{}: unreadable metadata for {:?}: {}", self.namespace, key, e);
                self.purge(key).await;
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(meta) => Some(meta),
            Err(e) => {
                log::warn!("{}: corrupt metadata for {:?}: {}", self.namespace, key, e);
                self.purge(key).await;
                None
            }
        }
    }

    /// File holding the compressed payload for `key`
    pub(crate) fn payload_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", file_stem(key)))
    }

    /// File holding the JSON metadata for `key`
    pub(crate) fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.meta", file_stem(key)))
    }

    async fn write_meta(&self, key: &str, meta: &EntryMeta) -> Result<()> {
        let raw = serde_json::to_vec(meta)
            .map_err(|e| Error::Storage(format!("{}: encode metadata failed: {}", self.namespace, e)))?;
        tokio::fs::write(self.meta_path(key), raw)
            .await
            .map_err(|e| Error::Storage(format!("{}: write metadata failed: {}", self.namespace, e)))
    }

    /// Best-effort removal of both files of a broken entry
    async fn purge(&self, key: &str) {
        for path in [self.payload_path(key), self.meta_path(key)] {
            let _ = tokio::fs::remove_file(path).await;
        }
    }

    /// Read every decodable metadata file in the namespace directory
    async fn scan_metas(&self) -> Vec<EntryMeta> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(_) => return out,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("meta") {
                continue;
            }
            let Ok(raw) = tokio::fs::read(&path).await else {
                continue;
            };
            match serde_json::from_slice::<EntryMeta>(&raw) {
                Ok(meta) => out.push(meta),
                Err(e) => log::warn!("{}: skipping corrupt metadata {:?}: {}", self.namespace, path, e),
            }
        }
        out
    }
}

/// Hex SHA-256 of the key, used as the on-disk file stem
fn file_stem(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Current time as unix seconds
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
