//! Recording backend that needs no window.

use super::{
    BufferHandle, MeshHandle, RenderBackend, ShaderHandle, Texture, TextureHandle, Uniform,
};
use crate::error::{Result, TilesError};
use macroquad::math::{Rect, Vec3};
use macroquad::texture::Image;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One recorded `draw_points` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Program active for the draw.
    pub shader: ShaderHandle,
    /// Mesh whose points were drawn.
    pub mesh: MeshHandle,
    /// Number of points in the mesh.
    pub points: usize,
    /// Attribute buffer bound for the UV rects, if any.
    pub uv_buffer: Option<BufferHandle>,
}

/// CPU-only backend.
///
/// Keeps the data every upload would have sent to the GPU and counts the
/// work done, so callers can check exactly when rebuilds happen. Texture
/// sizes come from [`register_texture`](Self::register_texture) or, failing
/// that, from decoding the image file.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u32,
    known_sizes: HashMap<PathBuf, (u32, u32)>,
    textures: HashMap<TextureHandle, Texture>,
    buffers: HashMap<BufferHandle, Vec<Rect>>,
    meshes: HashMap<MeshHandle, Vec<Vec3>>,
    uniforms: HashMap<String, Uniform>,
    bound_uv: Option<(BufferHandle, u32)>,
    active_shader: Option<ShaderHandle>,
    draws: Vec<DrawCall>,
    mesh_uploads: usize,
    buffer_uploads: usize,
    shader_compiles: usize,
    invalid_frees: usize,
}

impl HeadlessBackend {
    /// Empty backend with no registered textures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `load_texture(path)` succeed with the given size without touching disk.
    pub fn register_texture(&mut self, path: impl Into<PathBuf>, width: u32, height: u32) {
        self.known_sizes.insert(path.into(), (width, height));
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Meshes uploaded so far.
    pub fn mesh_uploads(&self) -> usize {
        self.mesh_uploads
    }

    /// Buffer uploads so far.
    pub fn buffer_uploads(&self) -> usize {
        self.buffer_uploads
    }

    /// Shader compilations so far.
    pub fn shader_compiles(&self) -> usize {
        self.shader_compiles
    }

    /// Frees of handles that were never created or already released.
    pub fn invalid_frees(&self) -> usize {
        self.invalid_frees
    }

    /// Every draw call, oldest first.
    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Points held by a live mesh.
    pub fn mesh_points(&self, mesh: MeshHandle) -> Option<&[Vec3]> {
        self.meshes.get(&mesh).map(Vec::as_slice)
    }

    /// Last data uploaded to a live buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[Rect]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Last value bound to the uniform `name`.
    pub fn uniform(&self, name: &str) -> Option<Uniform> {
        self.uniforms.get(name).copied()
    }

    /// Meshes uploaded and not yet freed.
    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Buffers created and not yet freed.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Textures loaded and not yet freed.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    fn note_invalid_free(&mut self, what: &str, id: u32) {
        log::warn!("Freeing unknown {} handle {}", what, id);
        self.invalid_frees += 1;
    }
}

impl RenderBackend for HeadlessBackend {
    fn load_texture(&mut self, path: &Path) -> Result<Texture> {
        let (width, height) = match self.known_sizes.get(path) {
            Some(&size) => size,
            None => {
                let bytes = std::fs::read(path).map_err(|e| TilesError::io(path, e))?;
                let image = Image::from_file_with_format(&bytes, None).map_err(|e| {
                    TilesError::Texture {
                        path: path.to_path_buf(),
                        reason: format!("{:?}", e),
                    }
                })?;
                (image.width as u32, image.height as u32)
            }
        };

        let texture = Texture {
            handle: TextureHandle(self.next_id()),
            width,
            height,
            asset_path: Some(path.to_path_buf()),
        };
        self.textures.insert(texture.handle, texture.clone());
        Ok(texture)
    }

    fn free_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_none() {
            self.note_invalid_free("texture", texture.0);
        }
    }

    fn create_buffer(&mut self) -> BufferHandle {
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(handle, Vec::new());
        handle
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[Rect]) {
        match self.buffers.get_mut(&buffer) {
            Some(contents) => {
                contents.clear();
                contents.extend_from_slice(data);
                self.buffer_uploads += 1;
            }
            None => log::warn!("Uploading to unknown buffer {}", buffer.0),
        }
    }

    fn free_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            self.note_invalid_free("buffer", buffer.0);
        }
        if matches!(self.bound_uv, Some((b, _)) if b == buffer) {
            self.bound_uv = None;
        }
    }

    fn upload_mesh(&mut self, points: &[Vec3]) -> MeshHandle {
        let handle = MeshHandle(self.next_id());
        self.meshes.insert(handle, points.to_vec());
        self.mesh_uploads += 1;
        handle
    }

    fn free_mesh(&mut self, mesh: MeshHandle) {
        if self.meshes.remove(&mesh).is_none() {
            self.note_invalid_free("mesh", mesh.0);
        }
    }

    fn compile_tilemap_shader(&mut self) -> Result<ShaderHandle> {
        self.shader_compiles += 1;
        Ok(ShaderHandle(self.next_id()))
    }

    fn use_shader(&mut self, shader: ShaderHandle) {
        self.active_shader = Some(shader);
    }

    fn bind_uniform(&mut self, _shader: ShaderHandle, name: &str, value: Uniform) {
        self.uniforms.insert(name.to_owned(), value);
    }

    fn bind_attribute_buffer(
        &mut self,
        _shader: ShaderHandle,
        buffer: BufferHandle,
        _name: &str,
        slot: u32,
    ) {
        self.bound_uv = Some((buffer, slot));
    }

    fn draw_points(&mut self, shader: ShaderHandle, mesh: MeshHandle, _position_attribute: &str) {
        if self.active_shader != Some(shader) {
            log::warn!("Drawing with shader {} that is not in use", shader.0);
        }
        let points = self.meshes.get(&mesh).map_or(0, Vec::len);
        self.draws.push(DrawCall {
            shader,
            mesh,
            points,
            uv_buffer: self.bound_uv.map(|(b, _)| b),
        });
    }
}
