use crate::render::{RenderBackend, Texture};
use macroquad::math::{Rect, Vec2};
use std::path::PathBuf;

/// Id of an empty grid cell.
pub const NO_TILE: u16 = u16::MAX;

/// Trimmed off every UV rect's height so linear filtering never samples
/// the first texel row of the tile below.
pub const UV_HEIGHT_EPSILON: f32 = 0.0001;

// float slack allowed when checking the atlas extent against the texture
const ATLAS_EXTENT_TOLERANCE: f32 = 1.0e-5;

/// A texture cut into a uniform grid of tiles.
///
/// All geometry is normalized by the texture size. `tile_box.x/y` is the
/// spacing between neighbouring tiles, `tile_box.w/h` the size of one tile.
/// `Tileset::default()` is the empty set used while no atlas is bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tileset {
    /// Atlas texture; `None` for the empty set or after [`cleanup`](Self::cleanup).
    pub texture: Option<Texture>,
    /// Normalized origin of the tile grid.
    pub offset: Vec2,
    /// Normalized spacing (`x`, `y`) and tile size (`w`, `h`).
    pub tile_box: Rect,
    /// File the set was loaded from or last saved as.
    pub asset_path: Option<PathBuf>,
    width: u16,
    height: u16,
    tile_mask: Option<Vec<u8>>,
}

impl Tileset {
    /// Builds a tileset from pixel-space geometry.
    ///
    /// `dims` is the atlas size in tiles; the remaining vectors are pixels
    /// and get divided by the texture size.
    pub fn from_pixels(
        texture: Texture,
        dims: (u16, u16),
        set_position: Vec2,
        tile_offset: Vec2,
        tile_size: Vec2,
    ) -> Self {
        let size = texture.size();
        let tile_offset = tile_offset / size;
        let tile_size = tile_size / size;
        Self {
            offset: set_position / size,
            tile_box: Rect::new(tile_offset.x, tile_offset.y, tile_size.x, tile_size.y),
            width: dims.0,
            height: dims.1,
            texture: Some(texture),
            asset_path: None,
            tile_mask: None,
        }
    }

    /// Atlas width in tiles.
    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Atlas height in tiles.
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Number of tiles in the atlas.
    #[inline]
    pub fn len(&self) -> u32 {
        self.width as u32 * self.height as u32
    }

    /// True for an atlas with no tiles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn contains(&self, index: u16) -> bool {
        (index as u32) < self.len()
    }

    /// Normalized UV rect of tile `index`; a zero rect when out of range.
    pub fn tile(&self, index: u16) -> Rect {
        if !self.contains(index) {
            log::warn!(
                "Requested tile index {} is out of bounds. (Tileset length is {})",
                index,
                self.len()
            );
            return Rect::default();
        }

        let col = (index % self.width) as f32;
        let row = (index / self.width) as f32;
        let spacing = Vec2::new(self.tile_box.x, self.tile_box.y);
        let dims = Vec2::new(self.tile_box.w, self.tile_box.h);

        let position = self.offset + Vec2::new(col, row) * (dims + spacing) - spacing;
        Rect::new(position.x, position.y, dims.x, dims.y - UV_HEIGHT_EPSILON)
    }

    /// Mask byte of tile `index`; 0 when out of range or never set.
    pub fn mask(&self, index: u16) -> u8 {
        if !self.contains(index) {
            log::warn!(
                "Requested mask of tile {} out of bounds. (Tileset length is {})",
                index,
                self.len()
            );
            return 0;
        }
        self.tile_mask
            .as_ref()
            .and_then(|mask| mask.get(index as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Sets the mask byte of tile `index`, allocating the buffer on the first non-zero write.
    pub fn set_mask(&mut self, index: u16, mask: u8) {
        if !self.contains(index) {
            log::warn!(
                "Can't set mask of tile {}, tileset length is {}",
                index,
                self.len()
            );
            return;
        }
        if self.tile_mask.is_none() && mask == 0 {
            return;
        }
        let len = self.len() as usize;
        let buffer = self.tile_mask.get_or_insert_with(|| vec![0; len]);
        if let Some(slot) = buffer.get_mut(index as usize) {
            *slot = mask;
        }
    }

    /// Raw mask buffer, row-major, if any mask was ever written.
    pub fn tile_mask(&self) -> Option<&[u8]> {
        self.tile_mask.as_deref()
    }

    /// Changes the atlas size in tiles, keeping masks in the top-left overlap.
    pub fn resize(&mut self, width: u16, height: u16) {
        if let Some(old) = self.tile_mask.take() {
            let (old_w, old_h) = (self.width as usize, self.height as usize);
            let (new_w, new_h) = (width as usize, height as usize);
            let mut mask = vec![0; new_w * new_h];
            for y in 0..old_h.min(new_h) {
                for x in 0..old_w.min(new_w) {
                    mask[y * new_w + x] = old[y * old_w + x];
                }
            }
            self.tile_mask = Some(mask);
        }
        self.width = width;
        self.height = height;
    }

    /// Size of one tile in texture pixels.
    pub fn tile_dims(&self) -> Vec2 {
        let size = self.texture.as_ref().map_or(Vec2::ZERO, Texture::size);
        Vec2::new(self.tile_box.w, self.tile_box.h) * size
    }

    /// Normalized far corner of the last tile.
    pub fn atlas_extent(&self) -> Vec2 {
        let spacing = Vec2::new(self.tile_box.x, self.tile_box.y);
        let dims = Vec2::new(self.tile_box.w, self.tile_box.h);
        let count = Vec2::new(self.width as f32, self.height as f32);
        self.offset - spacing + (dims + spacing) * count
    }

    /// Whether the declared grid lies inside the texture.
    pub fn fits_texture(&self) -> bool {
        self.fits_texture_within(Vec2::ZERO)
    }

    /// Like [`fits_texture`](Self::fits_texture), letting the extent overrun
    /// the texture by `slack` (normalized).
    pub(crate) fn fits_texture_within(&self, slack: Vec2) -> bool {
        let limit = Vec2::ONE + slack + Vec2::splat(ATLAS_EXTENT_TOLERANCE);
        let extent = self.atlas_extent();
        extent.x <= limit.x && extent.y <= limit.y
    }

    /// Releases the texture and the mask buffer. Safe to call twice.
    pub fn cleanup<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(texture) = self.texture.take() {
            backend.free_texture(texture.handle);
        }
        self.tile_mask = None;
    }
}
