//! JSON configuration for applications built on the tile engine.

use crate::error::{Result, TilesError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Sampling used for tileset textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFilter {
    /// Pixel art; no blending between texels.
    #[default]
    Nearest,
    /// Bilinear blending.
    Linear,
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}
fn default_tileset() -> String {
    "tileset.xml".to_owned()
}
fn default_tilemap() -> String {
    "tilemap.dat".to_owned()
}
fn default_map_dim() -> u16 {
    20
}

/// Asset locations and defaults for an application using the tile engine.
///
/// Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilesConfig {
    /// Folder the asset names below are joined onto.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// Tileset file name, native `.xml` or Tiled `.tsx`.
    #[serde(default = "default_tileset")]
    pub tileset: String,
    /// Binary tilemap file name.
    #[serde(default = "default_tilemap")]
    pub tilemap: String,
    /// Size of a freshly created map, in tiles.
    #[serde(default = "default_map_dim")]
    pub map_width: u16,
    /// Size of a freshly created map, in tiles.
    #[serde(default = "default_map_dim")]
    pub map_height: u16,
    /// Filtering applied to loaded textures.
    #[serde(default)]
    pub texture_filter: TextureFilter,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            tileset: default_tileset(),
            tilemap: default_tilemap(),
            map_width: default_map_dim(),
            map_height: default_map_dim(),
            texture_filter: TextureFilter::default(),
        }
    }
}

impl FromStr for TilesConfig {
    type Err = serde_json::Error;

    fn from_str(json: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(json)
    }
}

impl TilesConfig {
    /// Reads a JSON config; relative `assets_dir` is taken from the config's folder.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let txt = std::fs::read_to_string(path).map_err(|e| TilesError::io(path, e))?;
        let mut config = txt.parse::<Self>().map_err(|source| TilesError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.assets_dir = crate::paths::combine(crate::paths::directory_of(path), &config.assets_dir);
        Ok(config)
    }

    /// Full path of the tileset file.
    pub fn tileset_path(&self) -> PathBuf {
        self.assets_dir.join(&self.tileset)
    }

    /// Full path of the tilemap file.
    pub fn tilemap_path(&self) -> PathBuf {
        self.assets_dir.join(&self.tilemap)
    }
}
