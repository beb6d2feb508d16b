//! Kagami - avatar viewer engine core
//!
//! Persistent asset caches (cache-first network loading with category
//! persistence policies and explicit eviction) and the GPU resource
//! lifecycle for swapping live avatars without dangling references.

pub mod core;
pub mod cache;
pub mod asset;
pub mod animation;
pub mod scene;
pub mod render;
