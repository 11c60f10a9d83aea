use crate::error::{Result, TilesError};
use crate::render::{
    BufferHandle, MeshHandle, RenderBackend, RenderContext, ShaderHandle, Uniform,
    TILE_POSITION_ATTRIBUTE, TILE_UV_ATTRIBUTE, TILE_UV_ATTRIBUTE_SLOT,
};
use crate::tileset::{Tileset, NO_TILE};
use macroquad::math::{Mat4, Vec3};
use std::path::{Path, PathBuf};

/// One grid cell: a tileset index plus the mask cached when it was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Tileset index, or [`NO_TILE`].
    pub id: u16,
    /// Tileset mask of `id` at the time it was set.
    pub mask: u8,
}

impl Tile {
    /// An empty cell.
    pub const EMPTY: Tile = Tile { id: NO_TILE, mask: 0 };

    /// True for [`NO_TILE`] cells.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.id == NO_TILE
    }
}

impl Default for Tile {
    fn default() -> Self {
        Tile::EMPTY
    }
}

/// How stale the GPU copy of a tilemap is.
///
/// `MeshDirty` dominates `TilesDirty`: a mesh rebuild always refills the
/// UV buffer as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyState {
    /// GPU data matches the cells.
    #[default]
    Clean,
    /// Only the per-tile UV attributes changed.
    TilesDirty,
    /// The set of non-empty cells changed.
    MeshDirty,
}

impl DirtyState {
    #[inline]
    fn with_tiles(self) -> Self {
        match self {
            DirtyState::MeshDirty => DirtyState::MeshDirty,
            _ => DirtyState::TilesDirty,
        }
    }
}

/// A rectangular grid of tiles rendered against one [`Tileset`].
///
/// Edits only flip the dirty state; the GPU buffer and point mesh are
/// rebuilt on the next [`get_mesh`](Self::get_mesh), [`flush`](Self::flush)
/// or [`draw`](Self::draw).
///
/// The bound tileset's texture is not owned by the map: [`free`](Self::free)
/// only releases it when asked for a deep teardown.
#[derive(Debug)]
pub struct Tilemap {
    width: u16,
    height: u16,
    tiles: Vec<Tile>,
    tileset: Tileset,
    asset_path: Option<PathBuf>,
    dirty: DirtyState,
    is_empty: bool,
    mesh: Option<MeshHandle>,
    tile_buffer: BufferHandle,
}

impl Tilemap {
    /// Creates a `width`x`height` map with every cell empty and no tileset.
    pub fn new<B: RenderBackend>(width: u16, height: u16, backend: &mut B) -> Result<Self> {
        if width == 0 || height == 0 {
            log::error!(
                "Trying to create a tilemap with the invalid dimensions [{}x{}]",
                width,
                height
            );
            return Err(TilesError::InvalidDimensions { width, height });
        }

        Ok(Self {
            width,
            height,
            tiles: vec![Tile::EMPTY; width as usize * height as usize],
            tileset: Tileset::default(),
            asset_path: None,
            dirty: DirtyState::Clean,
            is_empty: true,
            mesh: None,
            tile_buffer: backend.create_buffer(),
        })
    }

    /// Width in cells.
    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height in cells.
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The bound tileset; empty until [`set_tileset`](Self::set_tileset).
    #[inline]
    pub fn tileset(&self) -> &Tileset {
        &self.tileset
    }

    /// Mutable access to the bound tileset, e.g. to edit masks.
    ///
    /// Geometry changes made here are not tracked; call
    /// [`set_tileset`](Self::set_tileset) to force a refresh.
    #[inline]
    pub fn tileset_mut(&mut self) -> &mut Tileset {
        &mut self.tileset
    }

    /// File the map was loaded from or last saved to.
    #[inline]
    pub fn asset_path(&self) -> Option<&Path> {
        self.asset_path.as_deref()
    }

    /// Records the map's file location.
    pub fn set_asset_path(&mut self, path: Option<PathBuf>) {
        self.asset_path = path;
    }

    /// What the next sync has to rebuild.
    #[inline]
    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    /// True when the last rebuild found no non-empty cell.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// All cells, row-major.
    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Binds a new tileset and schedules a full UV refresh.
    pub fn set_tileset(&mut self, tileset: Tileset) {
        if tileset.len() < self.tileset.len() {
            log::warn!(
                "Setting a tileset with smaller dimensions than before ({} < {} tiles), some tiles may be invalid",
                tileset.len(),
                self.tileset.len()
            );
        }
        self.tileset = tileset;
        self.dirty = self.dirty.with_tiles();
    }

    /// Returns the cell at `[x, y]`, or an empty tile if out of bounds.
    pub fn tile(&self, x: u16, y: u16) -> Tile {
        match self.index(x, y) {
            Some(i) => self.tiles[i],
            None => {
                log::warn!(
                    "Can't get out-of-bounds tile at [{}, {}] from a {}x{} map",
                    x,
                    y,
                    self.width,
                    self.height
                );
                Tile::EMPTY
            }
        }
    }

    /// Sets the cell at `[x, y]` to tile `id` ([`NO_TILE`] clears it).
    pub fn set_tile(&mut self, x: u16, y: u16, id: u16) {
        let Some(i) = self.index(x, y) else {
            log::warn!(
                "Can't set out-of-bounds tile at [{}, {}] from a {}x{} map",
                x,
                y,
                self.width,
                self.height
            );
            return;
        };
        if id != NO_TILE && id as u32 >= self.tileset.len() {
            log::warn!(
                "Can't set tile [{}, {}] to {}, tileset only has {} tiles",
                x,
                y,
                id,
                self.tileset.len()
            );
            return;
        }

        let old = self.tiles[i].id;
        if old != id {
            self.dirty = if old == NO_TILE || id == NO_TILE {
                DirtyState::MeshDirty
            } else {
                self.dirty.with_tiles()
            };
        }

        let mask = if id == NO_TILE { 0 } else { self.tileset.mask(id) };
        self.tiles[i] = Tile { id, mask };
    }

    /// Overrides the cached mask of one cell. Does not affect rendering.
    pub fn set_tile_mask(&mut self, x: u16, y: u16, mask: u8) {
        match self.index(x, y) {
            Some(i) => self.tiles[i].mask = mask,
            None => log::warn!(
                "Can't set mask of out-of-bounds tile at [{}, {}] from a {}x{} map",
                x,
                y,
                self.width,
                self.height
            ),
        }
    }

    /// Resizes the grid, keeping the previous contents in the top-left corner.
    pub fn resize(&mut self, width: u16, height: u16) {
        if width == 0 || height == 0 {
            log::warn!(
                "Trying to resize a map to invalid dimensions [{}x{}]",
                width,
                height
            );
            return;
        }

        let mut tiles = vec![Tile::EMPTY; width as usize * height as usize];
        // either grid may be the smaller one, so clamp on both
        let copy_w = self.width.min(width) as usize;
        let copy_h = self.height.min(height) as usize;
        for y in 0..copy_h {
            let src = y * self.width as usize;
            let dst = y * width as usize;
            tiles[dst..dst + copy_w].copy_from_slice(&self.tiles[src..src + copy_w]);
        }

        self.tiles = tiles;
        self.width = width;
        self.height = height;
        self.dirty = DirtyState::MeshDirty;
    }

    /// Brings the GPU copy up to date and returns the point mesh, if any.
    pub fn get_mesh<B: RenderBackend>(&mut self, backend: &mut B) -> Option<MeshHandle> {
        self.flush(backend);
        self.mesh
    }

    /// Resolves pending dirtiness without drawing.
    pub fn flush<B: RenderBackend>(&mut self, backend: &mut B) {
        match self.dirty {
            DirtyState::MeshDirty => self.rebuild_mesh(backend),
            DirtyState::TilesDirty => self.update_tiles(backend),
            DirtyState::Clean => {}
        }
    }

    fn rebuild_mesh<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(mesh) = self.mesh.take() {
            backend.free_mesh(mesh);
        }

        let width = self.width as usize;
        let points: Vec<Vec3> = self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_empty())
            .map(|(i, _)| Vec3::new((i % width) as f32, (i / width) as f32, 0.0))
            .collect();

        if points.is_empty() {
            self.is_empty = true;
            self.dirty = DirtyState::Clean;
            return;
        }

        log::debug!(
            "rebuilding tilemap mesh: {} points in a {}x{} grid",
            points.len(),
            self.width,
            self.height
        );
        self.mesh = Some(backend.upload_mesh(&points));
        self.is_empty = false;
        self.update_tiles(backend);
    }

    fn update_tiles<B: RenderBackend>(&mut self, backend: &mut B) {
        self.dirty = DirtyState::Clean;
        if self.tiles.is_empty() {
            log::warn!(
                "Can't update tiles of a {}x{} map",
                self.width,
                self.height
            );
            return;
        }

        // same order as the points emitted by rebuild_mesh
        let uvs: Vec<_> = self
            .tiles
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| self.tileset.tile(t.id))
            .collect();
        backend.upload_buffer(self.tile_buffer, &uvs);
    }

    /// Draws the map with `shader` using the given model and view matrices.
    pub fn draw<B: RenderBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        shader: ShaderHandle,
        model: Mat4,
        view: Mat4,
    ) {
        let backend = ctx.backend_mut();
        self.flush(backend);
        let Some(mesh) = self.mesh.filter(|_| !self.is_empty) else {
            return;
        };

        backend.use_shader(shader);
        backend.bind_uniform(shader, "u_transform", Uniform::Mat4(model));
        backend.bind_uniform(shader, "u_view", Uniform::Mat4(view));
        backend.bind_uniform(shader, "u_dims", Uniform::Vec2(self.tileset.tile_dims()));
        match &self.tileset.texture {
            Some(texture) => backend.bind_uniform(
                shader,
                "u_texture",
                Uniform::Texture {
                    texture: texture.handle,
                    unit: 0,
                },
            ),
            None => log::warn!("Drawing a tilemap without a tileset texture"),
        }
        backend.bind_attribute_buffer(
            shader,
            self.tile_buffer,
            TILE_UV_ATTRIBUTE,
            TILE_UV_ATTRIBUTE_SLOT,
        );
        backend.draw_points(shader, mesh, TILE_POSITION_ATTRIBUTE);
    }

    /// Draws the map with the context's shared tilemap shader.
    pub fn draw_default<B: RenderBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        model: Mat4,
        view: Mat4,
    ) -> Result<()> {
        let shader = ctx.tilemap_shader()?;
        self.draw(ctx, shader, model, view);
        Ok(())
    }

    /// Releases the map's GPU resources. `deep` also tears down the tileset.
    pub fn free<B: RenderBackend>(mut self, backend: &mut B, deep: bool) {
        if let Some(mesh) = self.mesh.take() {
            backend.free_mesh(mesh);
        }
        backend.free_buffer(self.tile_buffer);
        if deep {
            self.tileset.cleanup(backend);
        }
    }
}
