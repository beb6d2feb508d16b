//! Avatar slot lifecycle: mount, swap, dispose.
//!
//! One manager owns one live avatar at a time. Swapping runs a strict
//! teardown of the outgoing set before the incoming document is decoded,
//! so the render graph never holds a reference to freed GPU memory and
//! no object is destroyed while the animation driver could still touch
//! its skeleton.

use std::collections::HashSet;
use std::sync::Arc;

use crate::animation::Animator;
use crate::asset::document::AvatarAsset;
use crate::core::types::Result;
use crate::render::context::RenderContext;
use crate::render::upload::{self, RealizedAvatar};

use super::graph::{DrawEntry, SceneGraph};
use super::node::{NodeContent, SceneNode, SceneNodeId};
use super::resources::{GpuGeometry, GpuMaterial, GpuResourceSet, GpuTexture};

/// Lifecycle phase of the avatar slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Loading,
    Ready,
    Disposing,
}

/// Teardown telemetry from the most recent disposal
#[derive(Debug, Clone, Default)]
pub struct DisposalReport {
    pub released_geometries: usize,
    pub released_materials: usize,
    pub released_textures: usize,
    /// GPU bytes accounted to successfully released objects
    pub freed_bytes: u64,
    /// Release calls that failed; logged and skipped, never fatal
    pub failures: usize,
}

impl DisposalReport {
    pub fn total_released(&self) -> usize {
        self.released_geometries + self.released_materials + self.released_textures
    }
}

/// The mounted avatar and everything that must be torn down with it
struct LiveAvatar {
    name: String,
    root: SceneNodeId,
    resources: GpuResourceSet,
    animator: Animator,
    skinning_buffer: Option<wgpu::Buffer>,
}

/// Owns exactly one live avatar's GPU resources and the scene subtree
/// that references them.
pub struct SceneResourceManager {
    graph: SceneGraph,
    state: SlotState,
    live: Option<LiveAvatar>,
    last_disposal: Option<DisposalReport>,
}

impl Default for SceneResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneResourceManager {
    pub fn new() -> Self {
        Self {
            graph: SceneGraph::new(),
            state: SlotState::Empty,
            live: None,
            last_disposal: None,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn avatar_name(&self) -> Option<&str> {
        self.live.as_ref().map(|l| l.name.as_str())
    }

    /// GPU bytes held by the live avatar, zero when the slot is empty
    pub fn gpu_bytes(&self) -> u64 {
        self.live
            .as_ref()
            .map(|l| l.resources.total_gpu_bytes())
            .unwrap_or(0)
    }

    pub fn last_disposal(&self) -> Option<&DisposalReport> {
        self.last_disposal.as_ref()
    }

    pub fn animator(&self) -> Option<&Animator> {
        self.live.as_ref().map(|l| &l.animator)
    }

    pub fn animator_mut(&mut self) -> Option<&mut Animator> {
        self.live.as_mut().map(|l| &mut l.animator)
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Flatten the scene into draw entries for the current frame
    pub fn draw_list(&mut self) -> Vec<DrawEntry> {
        self.graph.flatten()
    }

    /// Replace the live avatar with the one described by `bytes`.
    ///
    /// A live avatar is fully disposed first, and one yield elapses
    /// between teardown and upload so the renderer can finish a frame
    /// that references neither set. The cycle runs even when `bytes`
    /// matches the current avatar; resource identity is rebuilt per
    /// call. On decode failure the slot is left empty and the error is
    /// returned to the caller.
    pub async fn swap_to(&mut self, bytes: &[u8], context: Option<&RenderContext>) -> Result<()> {
        if self.live.is_some() {
            let report = self.dispose_live();
            self.last_disposal = Some(report);
            tokio::task::yield_now().await;
        }

        self.state = SlotState::Loading;
        match self.mount(bytes, context) {
            Ok(()) => {
                self.state = SlotState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = SlotState::Empty;
                Err(e)
            }
        }
    }

    /// Dispose the live avatar, leaving the slot empty
    pub fn unmount(&mut self) {
        if self.live.is_some() {
            let report = self.dispose_live();
            self.last_disposal = Some(report);
        }
    }

    /// Advance animation and (with a device) rewrite the skinning uniform.
    /// This is the only per-frame mutation of a live resource set.
    pub fn update(&mut self, delta_time: f32, context: Option<&RenderContext>) {
        let Some(live) = &mut self.live else {
            return;
        };

        live.animator.update(delta_time);
        if let (Some(ctx), Some(buffer)) = (context, &live.skinning_buffer) {
            write_skinning(ctx, buffer, &live.animator);
        }
    }

    /// Decode, upload, and attach a new avatar. The graph is only touched
    /// after both fallible steps have succeeded.
    fn mount(&mut self, bytes: &[u8], context: Option<&RenderContext>) -> Result<()> {
        let asset = AvatarAsset::parse(bytes)?;
        let RealizedAvatar {
            resources,
            meshes,
            skinning_buffer,
        } = upload::realize_avatar(&asset, context)?;

        let graph_root = self.graph.root();
        let root = self.graph.add_child(graph_root, &asset.name, NodeContent::Group);
        for mesh in &meshes {
            self.graph.add_child(
                root,
                &mesh.name,
                NodeContent::Mesh {
                    geometry: mesh.geometry.clone(),
                    material: mesh.material.clone(),
                },
            );
        }

        let mut animator = Animator::new(asset.skeleton.clone());
        animator.update(0.0);

        let live = LiveAvatar {
            name: asset.name.clone(),
            root,
            resources,
            animator,
            skinning_buffer,
        };

        if let (Some(ctx), Some(buffer)) = (context, &live.skinning_buffer) {
            write_skinning(ctx, buffer, &live.animator);
        }

        log::info!(
            "Mounted avatar '{}': {} nodes, {} KB GPU",
            live.name,
            meshes.len() + 1,
            live.resources.total_gpu_bytes() / 1024,
        );

        self.live = Some(live);
        Ok(())
    }

    /// Ordered teardown of the live avatar.
    ///
    /// Sequence: stop and detach the animator, remove the subtree from
    /// the graph, collect distinct objects from the removed nodes, then
    /// release geometries, materials, and textures in that order. A
    /// failed release is logged and counted; the rest still run.
    fn dispose_live(&mut self) -> DisposalReport {
        let Some(mut live) = self.live.take() else {
            return DisposalReport::default();
        };
        self.state = SlotState::Disposing;

        live.animator.stop_all();
        live.animator.detach();

        let removed = self.graph.remove_subtree(live.root);
        let (geometries, materials, textures) = collect_distinct(&removed);

        let mut report = DisposalReport::default();
        for geometry in &geometries {
            match geometry.release() {
                Ok(()) => {
                    report.released_geometries += 1;
                    report.freed_bytes += geometry.size_bytes();
                }
                Err(e) => {
                    log::warn!("Release failed for geometry {:?}: {}", geometry.label(), e);
                    report.failures += 1;
                }
            }
        }
        for material in &materials {
            match material.release() {
                Ok(()) => {
                    report.released_materials += 1;
                    report.freed_bytes += material.size_bytes();
                }
                Err(e) => {
                    log::warn!("Release failed for material {:?}: {}", material.label(), e);
                    report.failures += 1;
                }
            }
        }
        for texture in &textures {
            match texture.release() {
                Ok(()) => {
                    report.released_textures += 1;
                    report.freed_bytes += texture.size_bytes();
                }
                Err(e) => {
                    log::warn!("Release failed for texture {:?}: {}", texture.label(), e);
                    report.failures += 1;
                }
            }
        }

        log::info!(
            "Disposed avatar '{}': {} objects released, {} KB freed, {} failures",
            live.name,
            report.total_released(),
            report.freed_bytes / 1024,
            report.failures,
        );

        drop(removed);
        drop(live);
        self.state = SlotState::Empty;
        report
    }
}

type Collected = (
    Vec<Arc<GpuGeometry>>,
    Vec<Arc<GpuMaterial>>,
    Vec<Arc<GpuTexture>>,
);

/// Collect each distinct geometry, material, and texture referenced by
/// the removed nodes. A texture shared by two materials appears once.
fn collect_distinct(nodes: &[SceneNode]) -> Collected {
    let mut geometries = Vec::new();
    let mut materials = Vec::new();
    let mut textures = Vec::new();
    let mut seen_geometries = HashSet::new();
    let mut seen_materials = HashSet::new();
    let mut seen_textures = HashSet::new();

    for node in nodes {
        let NodeContent::Mesh { geometry, material } = &node.content else {
            continue;
        };

        if seen_geometries.insert(Arc::as_ptr(geometry)) {
            geometries.push(geometry.clone());
        }
        if seen_materials.insert(Arc::as_ptr(material)) {
            materials.push(material.clone());
        }
        if let Some(texture) = material.texture() {
            if seen_textures.insert(Arc::as_ptr(texture)) {
                textures.push(texture.clone());
            }
        }
    }

    (geometries, materials, textures)
}

fn write_skinning(context: &RenderContext, buffer: &wgpu::Buffer, animator: &Animator) {
    context
        .queue
        .write_buffer(buffer, 0, bytemuck::cast_slice(animator.skinning_matrices()));
}
