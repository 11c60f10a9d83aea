//! Reading and writing tile assets.
//!
//! Tilemaps use a flat little-endian binary file; tilesets use XML, either
//! the native dialect (read/write) or Tiled's `.tsx` (read only).

pub mod binary;
pub mod tsx;
pub mod xml;

pub use binary::{load_tilemap, save_tilemap};
pub use tsx::{load_tsx, TsxMaskFn, TsxTile};
pub use xml::{load_native, save_tileset};

use crate::error::{Result, TilesError};
use crate::paths::extension_of;
use crate::render::RenderBackend;
use crate::tileset::Tileset;
use macroquad::math::Vec2;
use quick_xml::events::BytesStart;
use std::collections::HashMap;
use std::path::Path;

/// Tileset file format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilesetDialect {
    /// The crate's own XML form, read and written.
    Native,
    /// Tiled editor `.tsx`, read only.
    Tiled,
}

impl TilesetDialect {
    /// `.tsx` (any case) is Tiled; everything else is native.
    pub fn for_path(path: &Path) -> Self {
        match extension_of(path) {
            Some(ext) if ext.eq_ignore_ascii_case("tsx") => TilesetDialect::Tiled,
            _ => TilesetDialect::Native,
        }
    }
}

/// Loads a tileset in whichever dialect its extension names.
pub fn load_tileset<B: RenderBackend>(path: impl AsRef<Path>, backend: &mut B) -> Result<Tileset> {
    load_tileset_with(path, backend, None)
}

/// Like [`load_tileset`], translating `.tsx` per-tile metadata into masks with `mask_fn`.
///
/// `mask_fn` is ignored for native files, which store masks directly.
pub fn load_tileset_with<B: RenderBackend>(
    path: impl AsRef<Path>,
    backend: &mut B,
    mask_fn: Option<&mut TsxMaskFn<'_>>,
) -> Result<Tileset> {
    let path = path.as_ref();
    match TilesetDialect::for_path(path) {
        TilesetDialect::Native => load_native(path, backend),
        TilesetDialect::Tiled => load_tsx(path, backend, mask_fn),
    }
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        log::error!("Failed to load tileset at path {}", path.display());
        TilesError::io(path, e)
    })
}

pub(crate) fn attributes(path: &Path, element: &BytesStart) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| TilesError::xml(path, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| TilesError::xml(path, e))?
            .into_owned();
        out.insert(key, value);
    }
    Ok(out)
}

pub(crate) fn invalid(path: &Path, reason: impl Into<String>) -> TilesError {
    let reason = reason.into();
    log::error!("Tileset file {} is invalid: {}", path.display(), reason);
    TilesError::InvalidTileset {
        path: path.to_path_buf(),
        reason,
    }
}

/// Parses an optional numeric attribute.
pub(crate) fn number<T: std::str::FromStr>(
    path: &Path,
    attrs: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>> {
    attrs
        .get(name)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| invalid(path, format!("attribute `{name}` is not a number: {v:?}")))
        })
        .transpose()
}

/// Parses a two-component attribute written as `"x y"` or `"x,y"`.
pub(crate) fn vector(
    path: &Path,
    attrs: &HashMap<String, String>,
    name: &str,
) -> Result<Option<Vec2>> {
    let Some(raw) = attrs.get(name) else {
        return Ok(None);
    };
    let parts: Vec<f32> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| invalid(path, format!("attribute `{name}` is not a vector: {raw:?}")))?;
    match parts.as_slice() {
        [x, y] => Ok(Some(Vec2::new(*x, *y))),
        _ => Err(invalid(
            path,
            format!("attribute `{name}` needs two components: {raw:?}"),
        )),
    }
}

/// Parses a two-component attribute that must hold whole numbers.
pub(crate) fn whole_vector(
    path: &Path,
    attrs: &HashMap<String, String>,
    name: &str,
) -> Result<Option<Vec2>> {
    match vector(path, attrs, name)? {
        Some(v) if v.fract() != Vec2::ZERO => Err(invalid(
            path,
            format!("attribute `{name}` must hold whole numbers: {v}"),
        )),
        other => Ok(other),
    }
}

/// Rejects atlases with no tiles or a grid running off the texture.
///
/// `slack` is how far (normalized) the computed extent may overrun the
/// texture; the Tiled layout has no spacing after the last tile. The
/// texture is released before an error is returned.
pub(crate) fn validate<B: RenderBackend>(
    path: &Path,
    mut set: Tileset,
    slack: Vec2,
    backend: &mut B,
) -> Result<Tileset> {
    if set.is_empty() {
        set.cleanup(backend);
        return Err(invalid(path, "tileset declares no tiles"));
    }
    if !set.fits_texture_within(slack) {
        let extent = set.atlas_extent();
        log::error!(
            "Dimensions of tileset {} are larger than the texture it uses",
            path.display()
        );
        set.cleanup(backend);
        return Err(TilesError::AtlasOutOfBounds {
            path: path.to_path_buf(),
            extent,
        });
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_follows_extension() {
        assert_eq!(TilesetDialect::for_path(Path::new("a/set.tsx")), TilesetDialect::Tiled);
        assert_eq!(TilesetDialect::for_path(Path::new("a/SET.TSX")), TilesetDialect::Tiled);
        assert_eq!(TilesetDialect::for_path(Path::new("a/set.xml")), TilesetDialect::Native);
        assert_eq!(TilesetDialect::for_path(Path::new("a/set")), TilesetDialect::Native);
    }

    #[test]
    fn vectors_accept_both_separators() {
        let path = Path::new("t.xml");
        let mut attrs = HashMap::new();
        attrs.insert("a".to_owned(), "16 8".to_owned());
        attrs.insert("b".to_owned(), "4,2".to_owned());
        attrs.insert("c".to_owned(), "1".to_owned());
        assert_eq!(vector(path, &attrs, "a").unwrap(), Some(Vec2::new(16.0, 8.0)));
        assert_eq!(vector(path, &attrs, "b").unwrap(), Some(Vec2::new(4.0, 2.0)));
        assert!(vector(path, &attrs, "c").is_err());
        assert_eq!(vector(path, &attrs, "missing").unwrap(), None);
    }

    #[test]
    fn whole_vectors_reject_fractions() {
        let path = Path::new("t.xml");
        let mut attrs = HashMap::new();
        attrs.insert("a".to_owned(), "16 8".to_owned());
        attrs.insert("b".to_owned(), "2.5 2".to_owned());
        assert_eq!(whole_vector(path, &attrs, "a").unwrap(), Some(Vec2::new(16.0, 8.0)));
        assert!(matches!(
            whole_vector(path, &attrs, "b"),
            Err(TilesError::InvalidTileset { .. })
        ));
    }
}
