//! Persistent per-category asset cache
//!
//! Large binaries (avatar models, animation clips, runtime binaries,
//! typefaces) are expensive to re-download, so each category gets a durable
//! namespace on disk. `policy` decides what is worth keeping, `store` holds
//! the bytes, `registry` owns one store per category, `loader` resolves
//! URLs cache-first, and `janitor` evicts what has gone stale.

pub mod janitor;
pub mod loader;
pub mod policy;
pub mod registry;
pub mod store;
pub mod telemetry;

pub use janitor::{CleanupReport, DEFAULT_MAX_AGE_SECS, EvictionJanitor};
pub use loader::AssetLoader;
pub use policy::{CacheDecision, ResourceCategory, decide};
pub use registry::{CacheConfig, CacheReport, CacheStores, NamespaceStats};
pub use store::{BinaryStore, StoreStats};
pub use telemetry::{LoaderStats, human_size};
