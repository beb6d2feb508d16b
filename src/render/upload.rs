//! GPU realization of decoded avatar assets.
//!
//! Turns an [`AvatarAsset`] into device buffers and textures wrapped in
//! the scene resource handles. Runs in two modes: with a [`RenderContext`]
//! the real wgpu objects are created and filled, without one the same
//! handles are built empty so the rest of the pipeline (scene graph,
//! animation, disposal) behaves identically on machines with no GPU.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::animation::MAX_BONES;
use crate::asset::document::{AvatarAsset, MeshData, TextureData};
use crate::core::types::Result;
use crate::render::context::RenderContext;
use crate::scene::resources::{GpuGeometry, GpuMaterial, GpuResourceSet, GpuTexture};

/// Interleaved vertex layout shared by every avatar mesh.
/// Must match `AvatarVertex` in WGSL shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Bone indices into the skinning matrix array
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

/// Per-material uniform data.
/// Must match `MaterialParams` in WGSL shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MaterialUniform {
    pub base_color: [f32; 4],
    /// Whether a texture is bound (0 or 1)
    pub textured: u32,
    /// Padding for alignment
    pub _pad: [u32; 3],
}

/// One mat4 per bone slot, rewritten every frame the animator advances
pub const SKINNING_BUFFER_BYTES: u64 = (MAX_BONES * std::mem::size_of::<[f32; 16]>()) as u64;

/// A mesh ready to draw: geometry plus the material it was authored with
#[derive(Clone)]
pub struct RealizedMesh {
    pub name: String,
    pub geometry: Arc<GpuGeometry>,
    pub material: Arc<GpuMaterial>,
}

/// Everything uploaded for one avatar.
///
/// `resources` owns one handle per distinct GPU object, so disposal can
/// walk it without double-counting materials that share a texture.
pub struct RealizedAvatar {
    pub resources: GpuResourceSet,
    pub meshes: Vec<RealizedMesh>,
    pub skinning_buffer: Option<wgpu::Buffer>,
}

impl RealizedAvatar {
    pub fn is_skinned(&self) -> bool {
        self.skinning_buffer.is_some()
    }
}

/// Upload an avatar's meshes, materials, and textures to the device.
///
/// Textures are realized lazily: a document texture that no material
/// references is never uploaded. Materials pointing at the same texture
/// index share a single [`GpuTexture`] handle.
pub fn realize_avatar(asset: &AvatarAsset, context: Option<&RenderContext>) -> Result<RealizedAvatar> {
    let mut texture_slots: Vec<Option<Arc<GpuTexture>>> = vec![None; asset.textures.len()];
    let mut materials = Vec::with_capacity(asset.materials.len());

    for mat in &asset.materials {
        let texture = match mat.texture {
            Some(index) => Some(realized_texture(asset, index, &mut texture_slots, context)),
            None => None,
        };

        let uniform = MaterialUniform {
            base_color: mat.base_color,
            textured: texture.is_some() as u32,
            _pad: [0; 3],
        };
        let uniform_bytes = std::mem::size_of::<MaterialUniform>() as u64;

        let buffer = context.map(|ctx| {
            let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{}_material", mat.name)),
                size: uniform_bytes,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            ctx.queue.write_buffer(&buffer, 0, bytemuck::bytes_of(&uniform));
            buffer
        });

        materials.push(Arc::new(GpuMaterial::new(
            &mat.name,
            mat.base_color,
            texture,
            uniform_bytes,
            buffer,
        )));
    }

    let mut geometries = Vec::with_capacity(asset.meshes.len());
    let mut meshes = Vec::with_capacity(asset.meshes.len());
    let mut any_skinned = false;

    for mesh in &asset.meshes {
        any_skinned |= mesh.is_skinned();

        let vertices = build_vertices(mesh);
        let vertex_bytes = (vertices.len() * std::mem::size_of::<Vertex>()) as u64;
        let index_bytes = (mesh.indices.len() * std::mem::size_of::<u32>()) as u64;

        let (vertex_buffer, index_buffer) = match context {
            Some(ctx) => {
                let vertex_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{}_vertices", mesh.name)),
                    size: vertex_bytes,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                ctx.queue
                    .write_buffer(&vertex_buffer, 0, bytemuck::cast_slice(&vertices));

                let index_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{}_indices", mesh.name)),
                    size: index_bytes,
                    usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                ctx.queue
                    .write_buffer(&index_buffer, 0, bytemuck::cast_slice(&mesh.indices));

                (Some(vertex_buffer), Some(index_buffer))
            }
            None => (None, None),
        };

        let geometry = Arc::new(GpuGeometry::new(
            &mesh.name,
            mesh.vertex_count() as u32,
            mesh.indices.len() as u32,
            vertex_bytes + index_bytes,
            vertex_buffer,
            index_buffer,
        ));

        geometries.push(geometry.clone());
        meshes.push(RealizedMesh {
            name: mesh.name.clone(),
            geometry,
            material: materials[mesh.material].clone(),
        });
    }

    let skinning_buffer = match (any_skinned, context) {
        (true, Some(ctx)) => Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}_skinning", asset.name)),
            size: SKINNING_BUFFER_BYTES,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })),
        _ => None,
    };

    let textures: Vec<Arc<GpuTexture>> = texture_slots.into_iter().flatten().collect();

    let resources = GpuResourceSet {
        geometries,
        materials,
        textures,
    };

    log::info!(
        "Realized avatar '{}': {} meshes, {} materials, {} textures, {} KB",
        asset.name,
        meshes.len(),
        resources.materials.len(),
        resources.textures.len(),
        resources.total_gpu_bytes() / 1024,
    );

    Ok(RealizedAvatar {
        resources,
        meshes,
        skinning_buffer,
    })
}

/// Fetch or create the shared handle for a document texture index
fn realized_texture(
    asset: &AvatarAsset,
    index: usize,
    slots: &mut [Option<Arc<GpuTexture>>],
    context: Option<&RenderContext>,
) -> Arc<GpuTexture> {
    if let Some(existing) = &slots[index] {
        return existing.clone();
    }

    let data = &asset.textures[index];
    let handle = Arc::new(match context {
        Some(ctx) => GpuTexture::new(&data.name, data.width, data.height, upload_texture(ctx, data)),
        None => GpuTexture::new_cpu(&data.name, data.width, data.height),
    });
    slots[index] = Some(handle.clone());
    handle
}

fn upload_texture(context: &RenderContext, data: &TextureData) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };

    let texture = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&data.name),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    context.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.rgba8,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: Some(data.height),
        },
        size,
    );

    texture
}

/// Interleave the document's attribute arrays into the vertex layout.
/// Unskinned vertices ride bone 0 at full weight so the skinning shader
/// passes them through unchanged at bind pose.
fn build_vertices(mesh: &MeshData) -> Vec<Vertex> {
    (0..mesh.vertex_count())
        .map(|i| Vertex {
            position: mesh.positions[i],
            normal: mesh.normals[i],
            uv: mesh.uvs[i],
            joints: mesh
                .joints
                .get(i)
                .map(|j| [j[0] as u32, j[1] as u32, j[2] as u32, j[3] as u32])
                .unwrap_or([0; 4]),
            weights: mesh.weights.get(i).copied().unwrap_or([1.0, 0.0, 0.0, 0.0]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Bone, Skeleton};
    use crate::asset::document::MaterialData;
    use glam::Mat4;

    fn test_skeleton() -> Skeleton {
        let mut skeleton = Skeleton::new();
        skeleton
            .add_bone(Bone::new("hips", None, Mat4::IDENTITY))
            .unwrap();
        skeleton
    }

    fn quad_mesh(name: &str, material: usize, skinned: bool) -> MeshData {
        let (joints, weights) = if skinned {
            (vec![[0u16; 4]; 4], vec![[1.0, 0.0, 0.0, 0.0]; 4])
        } else {
            (Vec::new(), Vec::new())
        };
        MeshData {
            name: name.to_string(),
            material,
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            indices: vec![0, 1, 2, 0, 2, 3],
            joints,
            weights,
        }
    }

    fn checker_texture(name: &str) -> TextureData {
        TextureData {
            name: name.to_string(),
            width: 2,
            height: 2,
            rgba8: vec![255; 16],
        }
    }

    fn test_asset() -> AvatarAsset {
        AvatarAsset {
            name: "test_avatar".to_string(),
            textures: vec![checker_texture("skin"), checker_texture("unused")],
            materials: vec![
                MaterialData {
                    name: "body".to_string(),
                    base_color: [1.0, 1.0, 1.0, 1.0],
                    texture: Some(0),
                },
                MaterialData {
                    name: "trim".to_string(),
                    base_color: [0.2, 0.2, 0.8, 1.0],
                    texture: None,
                },
            ],
            meshes: vec![quad_mesh("torso", 0, true), quad_mesh("belt", 1, false)],
            skeleton: test_skeleton(),
        }
    }

    #[test]
    fn test_vertex_layout_sizes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 64);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 32);
        assert_eq!(SKINNING_BUFFER_BYTES, 256 * 64);
    }

    #[test]
    fn test_realize_without_device_builds_full_topology() {
        let asset = test_asset();
        let realized = realize_avatar(&asset, None).unwrap();

        assert_eq!(realized.meshes.len(), 2);
        assert_eq!(realized.resources.geometries.len(), 2);
        assert_eq!(realized.resources.materials.len(), 2);

        let torso = &realized.meshes[0];
        assert_eq!(torso.name, "torso");
        assert_eq!(torso.geometry.vertex_count(), 4);
        assert_eq!(torso.geometry.index_count(), 6);
        assert_eq!(torso.material.label(), "body");

        // No device means no skinning buffer even though the torso is skinned
        assert!(realized.skinning_buffer.is_none());
        assert!(!realized.is_skinned());
    }

    #[test]
    fn test_unreferenced_texture_not_realized() {
        let asset = test_asset();
        let realized = realize_avatar(&asset, None).unwrap();

        assert_eq!(realized.resources.textures.len(), 1);
        assert_eq!(realized.resources.textures[0].label(), "skin");
    }

    #[test]
    fn test_materials_share_one_texture_handle() {
        let mut asset = test_asset();
        asset.materials[1].texture = Some(0);

        let realized = realize_avatar(&asset, None).unwrap();

        assert_eq!(realized.resources.textures.len(), 1);
        let a = realized.resources.materials[0].texture().unwrap();
        let b = realized.resources.materials[1].texture().unwrap();
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_byte_accounting_matches_layout() {
        let asset = test_asset();
        let realized = realize_avatar(&asset, None).unwrap();

        // 4 vertices * 64 bytes + 6 indices * 4 bytes, per mesh
        let per_mesh = 4 * 64 + 6 * 4;
        let expected = 2 * per_mesh // geometries
            + 2 * 32 // material uniforms
            + 2 * 2 * 4; // one 2x2 rgba8 texture
        assert_eq!(realized.resources.total_gpu_bytes(), expected as u64);
    }

    #[test]
    fn test_build_vertices_interleaves_attributes() {
        let mesh = quad_mesh("torso", 0, true);
        let vertices = build_vertices(&mesh);

        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[2].position, [1.0, 1.0, 0.0]);
        assert_eq!(vertices[2].uv, [1.0, 1.0]);
        assert_eq!(vertices[2].joints, [0, 0, 0, 0]);
        assert_eq!(vertices[2].weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unskinned_vertices_default_to_root_bone() {
        let mesh = quad_mesh("belt", 0, false);
        let vertices = build_vertices(&mesh);

        for vertex in &vertices {
            assert_eq!(vertex.joints, [0; 4]);
            assert_eq!(vertex.weights, [1.0, 0.0, 0.0, 0.0]);
        }
    }
}
