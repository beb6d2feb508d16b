//! GPU resource handles with explicit release
//!
//! Geometry, material, and texture handles wrap their wgpu payloads in an
//! interior slot so the same types work headless: built without a device
//! the payload is `None`, but labels, byte accounting, and the release
//! protocol behave identically. `release()` destroys the payload at most
//! once; a second call is an `Error::Dispose`, which is what lets the
//! disposal sequence prove it never frees an object twice.

use std::sync::{Arc, Mutex};

use crate::core::error::Error;
use crate::core::types::Result;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct TexturePayload {
    texture: Option<wgpu::Texture>,
    released: bool,
}

/// A 2D RGBA8 texture resident on the device (or a headless stand-in)
pub struct GpuTexture {
    label: String,
    width: u32,
    height: u32,
    inner: Mutex<TexturePayload>,
}

impl GpuTexture {
    /// Wrap an uploaded texture
    pub fn new(label: impl Into<String>, width: u32, height: u32, texture: wgpu::Texture) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            inner: Mutex::new(TexturePayload {
                texture: Some(texture),
                released: false,
            }),
        }
    }

    /// Headless handle with no device payload
    pub fn new_cpu(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            inner: Mutex::new(TexturePayload {
                texture: None,
                released: false,
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// RGBA8 byte size of the pixel data
    pub fn size_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * 4
    }

    pub fn is_released(&self) -> bool {
        lock(&self.inner).released
    }

    /// Destroy the device texture. Exactly one call succeeds.
    pub fn release(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.released {
            return Err(Error::Dispose(format!(
                "texture {:?} released twice",
                self.label
            )));
        }
        inner.released = true;
        if let Some(texture) = inner.texture.take() {
            texture.destroy();
        }
        Ok(())
    }
}

struct MaterialPayload {
    uniform: Option<wgpu::Buffer>,
    released: bool,
}

/// A material: base color, optional shared texture, uniform buffer
pub struct GpuMaterial {
    label: String,
    base_color: [f32; 4],
    texture: Option<Arc<GpuTexture>>,
    uniform_bytes: u64,
    inner: Mutex<MaterialPayload>,
}

impl GpuMaterial {
    pub fn new(
        label: impl Into<String>,
        base_color: [f32; 4],
        texture: Option<Arc<GpuTexture>>,
        uniform_bytes: u64,
        uniform: Option<wgpu::Buffer>,
    ) -> Self {
        Self {
            label: label.into(),
            base_color,
            texture,
            uniform_bytes,
            inner: Mutex::new(MaterialPayload {
                uniform,
                released: false,
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn base_color(&self) -> [f32; 4] {
        self.base_color
    }

    /// The texture this material samples, shared with any other material
    /// that references the same document texture
    pub fn texture(&self) -> Option<&Arc<GpuTexture>> {
        self.texture.as_ref()
    }

    pub fn size_bytes(&self) -> u64 {
        self.uniform_bytes
    }

    pub fn is_released(&self) -> bool {
        lock(&self.inner).released
    }

    /// Destroy the material's own uniform buffer. The shared texture is
    /// released separately by whoever owns the de-duplicated set.
    pub fn release(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.released {
            return Err(Error::Dispose(format!(
                "material {:?} released twice",
                self.label
            )));
        }
        inner.released = true;
        if let Some(buffer) = inner.uniform.take() {
            buffer.destroy();
        }
        Ok(())
    }
}

struct GeometryPayload {
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    released: bool,
}

/// Vertex and index buffers for one mesh
pub struct GpuGeometry {
    label: String,
    vertex_count: u32,
    index_count: u32,
    buffer_bytes: u64,
    inner: Mutex<GeometryPayload>,
}

impl GpuGeometry {
    pub fn new(
        label: impl Into<String>,
        vertex_count: u32,
        index_count: u32,
        buffer_bytes: u64,
        vertex_buffer: Option<wgpu::Buffer>,
        index_buffer: Option<wgpu::Buffer>,
    ) -> Self {
        Self {
            label: label.into(),
            vertex_count,
            index_count,
            buffer_bytes,
            inner: Mutex::new(GeometryPayload {
                vertex_buffer,
                index_buffer,
                released: false,
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn size_bytes(&self) -> u64 {
        self.buffer_bytes
    }

    pub fn is_released(&self) -> bool {
        lock(&self.inner).released
    }

    /// Destroy both buffers. Exactly one call succeeds.
    pub fn release(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.released {
            return Err(Error::Dispose(format!(
                "geometry {:?} released twice",
                self.label
            )));
        }
        inner.released = true;
        if let Some(buffer) = inner.vertex_buffer.take() {
            buffer.destroy();
        }
        if let Some(buffer) = inner.index_buffer.take() {
            buffer.destroy();
        }
        Ok(())
    }
}

/// Everything one avatar owns on the GPU, de-duplicated by identity.
/// A texture shared by two materials appears exactly once in `textures`.
#[derive(Default)]
pub struct GpuResourceSet {
    pub geometries: Vec<Arc<GpuGeometry>>,
    pub materials: Vec<Arc<GpuMaterial>>,
    pub textures: Vec<Arc<GpuTexture>>,
}

impl GpuResourceSet {
    /// Total bytes across all owned resources
    pub fn total_gpu_bytes(&self) -> u64 {
        let geometry: u64 = self.geometries.iter().map(|g| g.size_bytes()).sum();
        let material: u64 = self.materials.iter().map(|m| m.size_bytes()).sum();
        let texture: u64 = self.textures.iter().map(|t| t.size_bytes()).sum();
        geometry + material + texture
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty() && self.materials.is_empty() && self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_double_release_is_dispose_error() {
        let texture = GpuTexture::new_cpu("skin", 64, 64);
        assert!(!texture.is_released());

        texture.release().unwrap();
        assert!(texture.is_released());

        let err = texture.release().unwrap_err();
        assert!(matches!(err, Error::Dispose(_)));
        assert!(err.to_string().contains("skin"));
    }

    #[test]
    fn test_geometry_release_twice_fails() {
        let geometry = GpuGeometry::new("torso", 3, 3, 128, None, None);
        geometry.release().unwrap();
        assert!(geometry.release().is_err());
    }

    #[test]
    fn test_material_keeps_shared_texture_reference() {
        let texture = Arc::new(GpuTexture::new_cpu("skin", 2, 2));
        let a = GpuMaterial::new("body", [1.0; 4], Some(texture.clone()), 32, None);
        let b = GpuMaterial::new("face", [1.0; 4], Some(texture.clone()), 32, None);

        assert!(Arc::ptr_eq(a.texture().unwrap(), b.texture().unwrap()));

        // Releasing a material leaves the shared texture alive.
        a.release().unwrap();
        assert!(!texture.is_released());
    }

    #[test]
    fn test_resource_set_byte_accounting() {
        let set = GpuResourceSet {
            geometries: vec![Arc::new(GpuGeometry::new("g", 3, 3, 100, None, None))],
            materials: vec![Arc::new(GpuMaterial::new("m", [1.0; 4], None, 32, None))],
            textures: vec![Arc::new(GpuTexture::new_cpu("t", 4, 4))],
        };

        assert_eq!(set.total_gpu_bytes(), 100 + 32 + 64);
        assert!(!set.is_empty());
        assert!(GpuResourceSet::default().is_empty());
    }
}
