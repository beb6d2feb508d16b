//! GPU context and resource upload

pub mod context;
pub mod upload;

pub use context::RenderContext;
pub use upload::{RealizedAvatar, RealizedMesh, realize_avatar};
