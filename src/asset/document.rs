//! Avatar document parsing and validation
//!
//! An avatar travels as one JSON document: embedded textures, materials
//! that may share a texture by index, skinned meshes, and a named bone
//! hierarchy. `AvatarAsset::parse` turns cached bytes into validated,
//! decoded CPU data; everything that can be wrong with a document is
//! reported as `Error::Decode` before any GPU work starts.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use glam::{Mat4, Quat, Vec3};
use serde::Deserialize;

use crate::animation::{Skeleton, SkeletonBuilder};
use crate::core::error::Error;
use crate::core::types::Result;

/// Raw document as it appears on the wire
#[derive(Debug, Deserialize)]
struct AvatarDocument {
    name: String,
    #[serde(default)]
    textures: Vec<TextureDoc>,
    materials: Vec<MaterialDoc>,
    meshes: Vec<MeshDoc>,
    bones: Vec<BoneDoc>,
}

/// A texture is either an image data-URI or raw RGBA8 pixels
#[derive(Debug, Deserialize)]
struct TextureDoc {
    name: String,
    /// `data:image/...;base64,` URI holding an encoded image
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    /// Base64 of raw RGBA8 pixels, `width * height * 4` bytes
    #[serde(default)]
    rgba8: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MaterialDoc {
    name: String,
    base_color: [f32; 4],
    #[serde(default)]
    texture: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MeshDoc {
    name: String,
    material: usize,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
    #[serde(default)]
    joints: Vec<[u16; 4]>,
    #[serde(default)]
    weights: Vec<[f32; 4]>,
}

#[derive(Debug, Deserialize)]
struct BoneDoc {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    translation: [f32; 3],
    /// Quaternion as xyzw
    rotation: [f32; 4],
    #[serde(default = "default_scale")]
    scale: [f32; 3],
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Decoded RGBA8 texture pixels
#[derive(Debug, Clone)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MaterialData {
    pub name: String,
    pub base_color: [f32; 4],
    /// Index into the document's texture list, validated in range
    pub texture: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub material: usize,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_skinned(&self) -> bool {
        !self.joints.is_empty()
    }
}

/// A fully decoded and validated avatar, ready for GPU realization
#[derive(Debug, Clone)]
pub struct AvatarAsset {
    pub name: String,
    pub textures: Vec<TextureData>,
    pub materials: Vec<MaterialData>,
    pub meshes: Vec<MeshData>,
    pub skeleton: Skeleton,
}

impl AvatarAsset {
    /// Parse and validate an avatar document.
    ///
    /// All index references (material to texture, mesh to material, vertex
    /// joints to bones) and attribute lengths are checked here, so later
    /// stages can index without bounds concerns.
    pub fn parse(bytes: &[u8]) -> Result<AvatarAsset> {
        let doc: AvatarDocument = serde_json::from_slice(bytes)
            .map_err(|e| Error::Decode(format!("avatar document: {}", e)))?;

        let textures = doc
            .textures
            .iter()
            .map(decode_texture)
            .collect::<Result<Vec<_>>>()?;

        let mut materials = Vec::with_capacity(doc.materials.len());
        for material in &doc.materials {
            if let Some(index) = material.texture {
                if index >= textures.len() {
                    return Err(Error::Decode(format!(
                        "material {:?}: texture index {} out of range ({} textures)",
                        material.name,
                        index,
                        textures.len()
                    )));
                }
            }
            materials.push(MaterialData {
                name: material.name.clone(),
                base_color: material.base_color,
                texture: material.texture,
            });
        }

        let skeleton = build_skeleton(&doc.bones)?;

        let meshes = doc
            .meshes
            .into_iter()
            .map(|mesh| validate_mesh(mesh, materials.len(), skeleton.bone_count()))
            .collect::<Result<Vec<_>>>()?;

        Ok(AvatarAsset {
            name: doc.name,
            textures,
            materials,
            meshes,
            skeleton,
        })
    }
}

fn decode_texture(doc: &TextureDoc) -> Result<TextureData> {
    match (&doc.data, &doc.rgba8) {
        (Some(uri), None) => decode_data_uri(&doc.name, uri),
        (None, Some(encoded)) => {
            let (width, height) = match (doc.width, doc.height) {
                (Some(w), Some(h)) => (w, h),
                _ => {
                    return Err(Error::Decode(format!(
                        "texture {:?}: raw pixels need width and height",
                        doc.name
                    )));
                }
            };
            let rgba8 = BASE64
                .decode(encoded)
                .map_err(|e| Error::Decode(format!("texture {:?}: bad base64: {}", doc.name, e)))?;
            let expected = width as usize * height as usize * 4;
            if rgba8.len() != expected {
                return Err(Error::Decode(format!(
                    "texture {:?}: {} bytes of RGBA8, expected {} for {}x{}",
                    doc.name,
                    rgba8.len(),
                    expected,
                    width,
                    height
                )));
            }
            Ok(TextureData {
                name: doc.name.clone(),
                width,
                height,
                rgba8,
            })
        }
        _ => Err(Error::Decode(format!(
            "texture {:?}: expected exactly one of a data URI or raw RGBA8 pixels",
            doc.name
        ))),
    }
}

/// Decode a `data:image/...;base64,` URI through the image crate
fn decode_data_uri(name: &str, uri: &str) -> Result<TextureData> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::Decode(format!("texture {:?}: not a data URI", name)))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| Error::Decode(format!("texture {:?}: data URI is not base64", name)))?;
    if !mime.starts_with("image/") {
        return Err(Error::Decode(format!(
            "texture {:?}: unsupported media type {:?}",
            name, mime
        )));
    }

    let encoded_image = BASE64
        .decode(payload)
        .map_err(|e| Error::Decode(format!("texture {:?}: bad base64: {}", name, e)))?;
    let image = image::load_from_memory(&encoded_image)
        .map_err(|e| Error::Decode(format!("texture {:?}: undecodable image: {}", name, e)))?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TextureData {
        name: name.to_string(),
        width,
        height,
        rgba8: rgba.into_raw(),
    })
}

fn build_skeleton(bones: &[BoneDoc]) -> Result<Skeleton> {
    let mut builder = SkeletonBuilder::new();
    for bone in bones {
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::from_array(bone.scale),
            Quat::from_array(bone.rotation),
            Vec3::from_array(bone.translation),
        );
        builder = match &bone.parent {
            Some(parent) => builder.add_bone(&bone.name, parent, transform),
            None => builder.add_root(&bone.name, transform),
        };
    }
    builder
        .build()
        .map_err(|e| Error::Decode(format!("skeleton: {}", e)))
}

fn validate_mesh(mesh: MeshDoc, material_count: usize, bone_count: usize) -> Result<MeshData> {
    if mesh.material >= material_count {
        return Err(Error::Decode(format!(
            "mesh {:?}: material index {} out of range ({} materials)",
            mesh.name, mesh.material, material_count
        )));
    }

    let vertex_count = mesh.positions.len();
    if vertex_count == 0 {
        return Err(Error::Decode(format!("mesh {:?}: no vertices", mesh.name)));
    }
    for (attribute, len) in [("normals", mesh.normals.len()), ("uvs", mesh.uvs.len())] {
        if len != vertex_count {
            return Err(Error::Decode(format!(
                "mesh {:?}: {} length {} does not match {} positions",
                mesh.name, attribute, len, vertex_count
            )));
        }
    }

    // Skinning attributes come as a pair or not at all.
    if mesh.joints.len() != mesh.weights.len() {
        return Err(Error::Decode(format!(
            "mesh {:?}: {} joint sets but {} weight sets",
            mesh.name,
            mesh.joints.len(),
            mesh.weights.len()
        )));
    }
    if !mesh.joints.is_empty() {
        if mesh.joints.len() != vertex_count {
            return Err(Error::Decode(format!(
                "mesh {:?}: joints length {} does not match {} positions",
                mesh.name,
                mesh.joints.len(),
                vertex_count
            )));
        }
        for joints in &mesh.joints {
            for &joint in joints {
                if joint as usize >= bone_count {
                    return Err(Error::Decode(format!(
                        "mesh {:?}: joint index {} out of range ({} bones)",
                        mesh.name, joint, bone_count
                    )));
                }
            }
        }
    }

    if mesh.indices.len() % 3 != 0 {
        return Err(Error::Decode(format!(
            "mesh {:?}: {} indices is not a whole number of triangles",
            mesh.name,
            mesh.indices.len()
        )));
    }
    for &index in &mesh.indices {
        if index as usize >= vertex_count {
            return Err(Error::Decode(format!(
                "mesh {:?}: vertex index {} out of range ({} vertices)",
                mesh.name, index, vertex_count
            )));
        }
    }

    Ok(MeshData {
        name: mesh.name,
        material: mesh.material,
        positions: mesh.positions,
        normals: mesh.normals,
        uvs: mesh.uvs,
        indices: mesh.indices,
        joints: mesh.joints,
        weights: mesh.weights,
    })
}
