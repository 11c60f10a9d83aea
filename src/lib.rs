//! Tile-grid engine for Macroquad: texture atlases, tilemaps kept in sync
//! with GPU buffers, binary tilemap files and XML/`.tsx` tilesets.

#![warn(missing_docs)]

mod config;
mod error;
pub mod loader;
mod map;
pub mod paths;
pub mod render;
mod tileset;

pub use config::{TextureFilter, TilesConfig};
pub use error::{Result, TilesError};
pub use loader::{
    load_tilemap, load_tileset, load_tileset_with, save_tilemap, save_tileset, TilesetDialect,
    TsxTile,
};
pub use map::{DirtyState, Tile, Tilemap};
pub use render::{HeadlessBackend, MacroquadBackend, RenderBackend, RenderContext};
pub use tileset::{Tileset, NO_TILE, UV_HEIGHT_EPSILON};
