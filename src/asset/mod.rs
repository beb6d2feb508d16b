//! Avatar and clip documents plus the loading facade

pub mod clips;
pub mod document;
pub mod facade;

pub use clips::parse_clip;
pub use document::{AvatarAsset, MaterialData, MeshData, TextureData};
pub use facade::{load_animation_clip, load_avatar_model, load_runtime_binary, load_typeface};
