//! Per-category loading entry points
//!
//! UI code calls these instead of the raw loader so the category is fixed
//! at the call site and failures read as "failed to load avatar model: ..."
//! without exposing cache internals.

use crate::cache::loader::AssetLoader;
use crate::cache::policy::ResourceCategory;
use crate::core::types::Result;

/// Fetch an avatar model document, cache-first
pub async fn load_avatar_model(loader: &AssetLoader, url: &str) -> Result<Vec<u8>> {
    load(loader, url, ResourceCategory::AvatarModel).await
}

/// Fetch an animation clip document, cache-first
pub async fn load_animation_clip(loader: &AssetLoader, url: &str) -> Result<Vec<u8>> {
    load(loader, url, ResourceCategory::Animation).await
}

/// Fetch an inference runtime binary, cache-first
pub async fn load_runtime_binary(loader: &AssetLoader, url: &str) -> Result<Vec<u8>> {
    load(loader, url, ResourceCategory::RuntimeBinary).await
}

/// Fetch a typeface, cache-first
pub async fn load_typeface(loader: &AssetLoader, url: &str) -> Result<Vec<u8>> {
    load(loader, url, ResourceCategory::Typeface).await
}

async fn load(loader: &AssetLoader, url: &str, category: ResourceCategory) -> Result<Vec<u8>> {
    loader
        .load_with_cache(url, category)
        .await
        .map_err(|e| e.while_loading(category.label()))
}
