//! GPU seam for the tilemap.
//!
//! The tilemap never talks to a graphics API directly. It drives a
//! [`RenderBackend`], which is either a live macroquad context or the
//! [`HeadlessBackend`] used by tools and tests.

mod headless;
mod macroquad_backend;

pub use headless::{DrawCall, HeadlessBackend};
pub use macroquad_backend::MacroquadBackend;

use crate::error::Result;
use macroquad::math::{Mat4, Rect, Vec2, Vec3};
use std::path::{Path, PathBuf};

/// Vertex attribute slot the per-tile UV rects are bound to.
pub const TILE_UV_ATTRIBUTE_SLOT: u32 = 1;
/// Shader attribute name carrying the per-tile UV rect.
pub const TILE_UV_ATTRIBUTE: &str = "i_uv";
/// Shader attribute name carrying the tile grid position.
pub const TILE_POSITION_ATTRIBUTE: &str = "i_pos";

/// Backend id of an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Backend id of a per-vertex attribute buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Backend id of an uploaded point mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// Backend id of a compiled shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

/// A texture uploaded by a backend, with the pixel size the atlas math needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// Id to pass back to the backend that created it.
    pub handle: TextureHandle,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Image file the texture was loaded from.
    pub asset_path: Option<PathBuf>,
}

impl Texture {
    /// Pixel size as a vector.
    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Value bound to a named shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    /// A 4x4 matrix.
    Mat4(Mat4),
    /// A two-component float vector.
    Vec2(Vec2),
    /// A sampler bound to texture `unit`.
    Texture {
        /// Texture to sample.
        texture: TextureHandle,
        /// Texture unit the sampler reads.
        unit: u32,
    },
}

/// Narrow interface over the graphics layer.
///
/// Handles are plain ids; whoever created a resource releases it exactly
/// once through the matching `free_*` call.
pub trait RenderBackend {
    /// Loads an image file into a texture.
    fn load_texture(&mut self, path: &Path) -> Result<Texture>;
    /// Releases a texture from [`load_texture`](Self::load_texture).
    fn free_texture(&mut self, texture: TextureHandle);

    /// Allocates an empty per-vertex attribute buffer.
    fn create_buffer(&mut self) -> BufferHandle;
    /// Replaces the whole content of `buffer` with `data`.
    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[Rect]);
    /// Releases a buffer from [`create_buffer`](Self::create_buffer).
    fn free_buffer(&mut self, buffer: BufferHandle);

    /// Uploads a point list and returns a drawable mesh.
    fn upload_mesh(&mut self, points: &[Vec3]) -> MeshHandle;
    /// Releases a mesh from [`upload_mesh`](Self::upload_mesh).
    fn free_mesh(&mut self, mesh: MeshHandle);

    /// Builds the point-sprite tilemap program.
    fn compile_tilemap_shader(&mut self) -> Result<ShaderHandle>;
    /// Makes `shader` the active program.
    fn use_shader(&mut self, shader: ShaderHandle);
    /// Sets the uniform `name` of `shader`.
    fn bind_uniform(&mut self, shader: ShaderHandle, name: &str, value: Uniform);
    /// Feeds `buffer` to the per-vertex attribute `name` at `slot`.
    fn bind_attribute_buffer(
        &mut self,
        shader: ShaderHandle,
        buffer: BufferHandle,
        name: &str,
        slot: u32,
    );
    /// Draws every vertex of `mesh` as a point primitive.
    fn draw_points(&mut self, shader: ShaderHandle, mesh: MeshHandle, position_attribute: &str);
}

/// Owns a backend and the lazily compiled tilemap shader.
///
/// Passed to [`Tilemap::draw`](crate::Tilemap::draw) instead of relying on
/// process-wide state.
pub struct RenderContext<B: RenderBackend> {
    backend: B,
    tilemap_shader: Option<ShaderHandle>,
}

impl<B: RenderBackend> RenderContext<B> {
    /// Wraps `backend`; the shader is compiled on the first draw.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            tilemap_shader: None,
        }
    }

    /// The wrapped backend.
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The wrapped backend, for uploads and frees.
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Returns the tilemap shader, compiling it on first use.
    pub fn tilemap_shader(&mut self) -> Result<ShaderHandle> {
        if let Some(shader) = self.tilemap_shader {
            return Ok(shader);
        }
        let shader = self.backend.compile_tilemap_shader()?;
        log::debug!("compiled tilemap shader {:?}", shader);
        self.tilemap_shader = Some(shader);
        Ok(shader)
    }

    /// Forgets the cached shader so the next request recompiles it.
    pub fn invalidate_shader(&mut self) {
        self.tilemap_shader = None;
    }

    /// Unwraps the backend, dropping the cached shader handle.
    pub fn into_backend(self) -> B {
        self.backend
    }
}

pub(crate) const TILEMAP_VERTEX_SHADER: &str = r#"#version 100
precision lowp float;

attribute vec3 position;
attribute vec2 texcoord;

varying vec2 uv;

uniform mat4 Model;
uniform mat4 Projection;
uniform mat4 u_transform;
uniform mat4 u_view;
uniform vec2 u_dims;

void main() {
    gl_Position = u_view * u_transform * vec4(position.xy * u_dims, 0.0, 1.0);
    uv = texcoord;
}
"#;

pub(crate) const TILEMAP_FRAGMENT_SHADER: &str = r#"#version 100
precision lowp float;

varying vec2 uv;

uniform sampler2D u_texture;

void main() {
    gl_FragColor = texture2D(u_texture, uv);
}
"#;
