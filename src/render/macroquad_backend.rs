//! Backend drawing through macroquad's immediate-mode meshes.

use super::{
    BufferHandle, MeshHandle, RenderBackend, ShaderHandle, Texture, TextureHandle, Uniform,
    TILEMAP_FRAGMENT_SHADER, TILEMAP_VERTEX_SHADER,
};
use crate::config::{TextureFilter, TilesConfig};
use crate::error::{Result, TilesError};
use macroquad::material::{gl_use_default_material, gl_use_material, load_material, Material, MaterialParams};
use macroquad::miniquad::{ShaderSource, UniformDesc, UniformType};
use macroquad::models::{draw_mesh, Mesh, Vertex};
use macroquad::prelude::*;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

// macroquad's default per-draw-call geometry limits; larger meshes are
// dropped with a warning instead of drawn
const MAX_DRAWCALL_VERTICES: usize = 10_000;
const MAX_DRAWCALL_INDICES: usize = 5_000;

// each tile quad is 4 vertices and 6 indices
const MAX_QUADS_PER_BATCH: usize = if MAX_DRAWCALL_VERTICES / 4 < MAX_DRAWCALL_INDICES / 6 {
    MAX_DRAWCALL_VERTICES / 4
} else {
    MAX_DRAWCALL_INDICES / 6
};

/// Splits `count` quads into runs that each fit one macroquad draw call.
fn batch_ranges(count: usize) -> impl Iterator<Item = Range<usize>> {
    (0..count)
        .step_by(MAX_QUADS_PER_BATCH)
        .map(move |start| start..(start + MAX_QUADS_PER_BATCH).min(count))
}

/// Live backend drawing through macroquad.
///
/// Macroquad has no point-sprite pipeline, so each tile point is expanded
/// into a quad on the CPU at draw time, using the UV rect at the same index
/// of the bound attribute buffer. The quad spans one grid unit; the shader
/// scales it by `u_dims`.
pub struct MacroquadBackend {
    filter: FilterMode,
    next_id: u32,
    textures: HashMap<TextureHandle, Texture2D>,
    buffers: HashMap<BufferHandle, Vec<Rect>>,
    meshes: HashMap<MeshHandle, Vec<Vec3>>,
    materials: HashMap<ShaderHandle, Material>,
    bound_texture: Option<TextureHandle>,
    bound_uv: Option<BufferHandle>,
}

impl Default for MacroquadBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroquadBackend {
    /// Backend with nearest-neighbour texture filtering.
    pub fn new() -> Self {
        Self {
            filter: FilterMode::Nearest,
            next_id: 0,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            meshes: HashMap::new(),
            materials: HashMap::new(),
            bound_texture: None,
            bound_uv: None,
        }
    }

    /// Backend using the texture filter named in `config`.
    pub fn with_config(config: &TilesConfig) -> Self {
        let mut backend = Self::new();
        backend.filter = match config.texture_filter {
            TextureFilter::Nearest => FilterMode::Nearest,
            TextureFilter::Linear => FilterMode::Linear,
        };
        backend
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// The macroquad texture behind `handle`, for callers mixing in their own drawing.
    pub fn texture(&self, handle: TextureHandle) -> Option<&Texture2D> {
        self.textures.get(&handle)
    }
}

fn tile_quad(point: Vec3, uv: Rect, base: u16, vertices: &mut Vec<Vertex>, indices: &mut Vec<u16>) {
    let (x, y, z) = (point.x, point.y, point.z);
    vertices.push(Vertex::new(x, y, z, uv.x, uv.y, WHITE));
    vertices.push(Vertex::new(x + 1.0, y, z, uv.x + uv.w, uv.y, WHITE));
    vertices.push(Vertex::new(x + 1.0, y + 1.0, z, uv.x + uv.w, uv.y + uv.h, WHITE));
    vertices.push(Vertex::new(x, y + 1.0, z, uv.x, uv.y + uv.h, WHITE));
    indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

impl RenderBackend for MacroquadBackend {
    fn load_texture(&mut self, path: &Path) -> Result<Texture> {
        let bytes = std::fs::read(path).map_err(|e| TilesError::io(path, e))?;
        let image = Image::from_file_with_format(&bytes, None).map_err(|e| TilesError::Texture {
            path: path.to_path_buf(),
            reason: format!("{:?}", e),
        })?;

        let tex = Texture2D::from_image(&image);
        tex.set_filter(self.filter);

        let handle = TextureHandle(self.next_id());
        let texture = Texture {
            handle,
            width: image.width as u32,
            height: image.height as u32,
            asset_path: Some(path.to_path_buf()),
        };
        self.textures.insert(handle, tex);
        Ok(texture)
    }

    fn free_texture(&mut self, texture: TextureHandle) {
        // Texture2D releases its GL object when the last clone drops
        if self.textures.remove(&texture).is_none() {
            log::warn!("Freeing unknown texture handle {}", texture.0);
        }
        if self.bound_texture == Some(texture) {
            self.bound_texture = None;
        }
    }

    fn create_buffer(&mut self) -> BufferHandle {
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(handle, Vec::new());
        handle
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[Rect]) {
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            contents.clear();
            contents.extend_from_slice(data);
        }
    }

    fn free_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        if self.bound_uv == Some(buffer) {
            self.bound_uv = None;
        }
    }

    fn upload_mesh(&mut self, points: &[Vec3]) -> MeshHandle {
        let handle = MeshHandle(self.next_id());
        self.meshes.insert(handle, points.to_vec());
        handle
    }

    fn free_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
    }

    fn compile_tilemap_shader(&mut self) -> Result<ShaderHandle> {
        let material = load_material(
            ShaderSource::Glsl {
                vertex: TILEMAP_VERTEX_SHADER,
                fragment: TILEMAP_FRAGMENT_SHADER,
            },
            MaterialParams {
                uniforms: vec![
                    UniformDesc::new("u_transform", UniformType::Mat4),
                    UniformDesc::new("u_view", UniformType::Mat4),
                    UniformDesc::new("u_dims", UniformType::Float2),
                ],
                textures: vec!["u_texture".to_string()],
                ..Default::default()
            },
        )
        .map_err(|e| TilesError::Shader(format!("{:?}", e)))?;

        let handle = ShaderHandle(self.next_id());
        self.materials.insert(handle, material);
        Ok(handle)
    }

    fn use_shader(&mut self, shader: ShaderHandle) {
        match self.materials.get(&shader) {
            Some(material) => gl_use_material(material),
            None => log::warn!("Using unknown shader handle {}", shader.0),
        }
    }

    fn bind_uniform(&mut self, shader: ShaderHandle, name: &str, value: Uniform) {
        let Some(material) = self.materials.get(&shader) else {
            log::warn!("Binding uniform {} on unknown shader {}", name, shader.0);
            return;
        };
        match value {
            Uniform::Mat4(m) => material.set_uniform(name, m),
            Uniform::Vec2(v) => material.set_uniform(name, v),
            Uniform::Texture { texture, .. } => match self.textures.get(&texture) {
                Some(tex) => {
                    material.set_texture(name, tex.clone());
                    self.bound_texture = Some(texture);
                }
                None => log::warn!("Binding unknown texture {} to {}", texture.0, name),
            },
        }
    }

    fn bind_attribute_buffer(
        &mut self,
        _shader: ShaderHandle,
        buffer: BufferHandle,
        _name: &str,
        _slot: u32,
    ) {
        self.bound_uv = Some(buffer);
    }

    fn draw_points(&mut self, shader: ShaderHandle, mesh: MeshHandle, _position_attribute: &str) {
        let (Some(material), Some(points)) = (self.materials.get(&shader), self.meshes.get(&mesh))
        else {
            log::warn!("Skipping draw of mesh {} with shader {}", mesh.0, shader.0);
            return;
        };
        let uvs: &[Rect] = self
            .bound_uv
            .and_then(|b| self.buffers.get(&b))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        if uvs.len() < points.len() {
            log::warn!(
                "UV buffer holds {} rects for {} points, missing tiles are not drawn",
                uvs.len(),
                points.len()
            );
        }
        let texture = self
            .bound_texture
            .and_then(|t| self.textures.get(&t))
            .cloned();

        gl_use_material(material);
        let drawable = points.len().min(uvs.len());
        for batch in batch_ranges(drawable) {
            let mut vertices = Vec::with_capacity(batch.len() * 4);
            let mut indices = Vec::with_capacity(batch.len() * 6);
            let quads = points[batch.clone()].iter().zip(&uvs[batch]);
            for (i, (point, uv)) in quads.enumerate() {
                tile_quad(*point, *uv, (i * 4) as u16, &mut vertices, &mut indices);
            }
            draw_mesh(&Mesh {
                vertices,
                indices,
                texture: texture.clone(),
            });
        }
        gl_use_default_material();
    }
}
