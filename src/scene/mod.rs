//! Scene graph, GPU resource handles, and the avatar slot lifecycle

pub mod graph;
pub mod manager;
pub mod node;
pub mod resources;

pub use graph::{DrawEntry, SceneGraph};
pub use manager::{DisposalReport, SceneResourceManager, SlotState};
pub use node::{LocalTransform, NodeContent, SceneNode, SceneNodeId};
pub use resources::{GpuGeometry, GpuMaterial, GpuResourceSet, GpuTexture};
