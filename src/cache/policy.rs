//! Cache admission policy
//!
//! Pure decision table mapping (resource category, byte size) to a
//! persist-or-discard choice. Categories of large, session-spanning binaries
//! are always worth keeping; small cheap-to-refetch assets are not.

/// Smallest generic asset worth the store overhead
pub const GENERIC_PERSIST_MIN_BYTES: u64 = 100 * 1024;

/// Smallest background image worth the store overhead
pub const BACKGROUND_PERSIST_MIN_BYTES: u64 = 200 * 1024;

/// Resource categories recognized by the cache subsystem
///
/// A closed enumeration: each category maps to exactly one store namespace
/// and one admission rule. Callers tag every load request with its category
/// explicitly; nothing is ever inferred from URL shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    /// Humanoid 3D character assets (geometry, materials, skeleton)
    AvatarModel,
    /// Skeletal animation clips
    Animation,
    /// Inference runtime binaries (e.g. wasm bundles)
    RuntimeBinary,
    /// Typeface binaries for the typography subsystem
    Typeface,
    /// Anything without a dedicated category
    GenericAsset,
    /// Scene background images
    BackgroundImage,
}

impl ResourceCategory {
    /// Every category, in declaration order
    pub const ALL: [ResourceCategory; 6] = [
        ResourceCategory::AvatarModel,
        ResourceCategory::Animation,
        ResourceCategory::RuntimeBinary,
        ResourceCategory::Typeface,
        ResourceCategory::GenericAsset,
        ResourceCategory::BackgroundImage,
    ];

    /// Store namespace for this category (one directory per namespace)
    pub fn namespace(self) -> &'static str {
        match self {
            ResourceCategory::AvatarModel => "avatar-models",
            ResourceCategory::Animation => "animations",
            ResourceCategory::RuntimeBinary => "runtime-binaries",
            ResourceCategory::Typeface => "typefaces",
            ResourceCategory::GenericAsset => "generic-assets",
            ResourceCategory::BackgroundImage => "background-images",
        }
    }

    /// Human-readable label used in log lines and facade error messages
    pub fn label(self) -> &'static str {
        match self {
            ResourceCategory::AvatarModel => "avatar model",
            ResourceCategory::Animation => "animation clip",
            ResourceCategory::RuntimeBinary => "runtime binary",
            ResourceCategory::Typeface => "typeface",
            ResourceCategory::GenericAsset => "asset",
            ResourceCategory::BackgroundImage => "background image",
        }
    }

    /// Look up a category by its namespace string (operator tooling)
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.namespace() == namespace)
    }
}

/// Outcome of an admission decision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheDecision {
    pub persist: bool,
}

/// Decide whether a payload of `byte_size` bytes in `category` should be
/// written to the durable store or used once and discarded.
///
/// Pure function over a fixed table; no IO, no URL inspection.
pub fn decide(category: ResourceCategory, byte_size: u64) -> CacheDecision {
    let persist = match category {
        ResourceCategory::AvatarModel
        | ResourceCategory::Animation
        | ResourceCategory::RuntimeBinary
        | ResourceCategory::Typeface => true,
        ResourceCategory::BackgroundImage => byte_size >= BACKGROUND_PERSIST_MIN_BYTES,
        ResourceCategory::GenericAsset => byte_size >= GENERIC_PERSIST_MIN_BYTES,
    };
    CacheDecision { persist }
}
