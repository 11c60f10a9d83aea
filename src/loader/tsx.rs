//! Tiled `.tsx` tilesets (read only).
//!
//! Only the single-image form is understood. Per-tile `<properties>` have
//! no native equivalent; a caller-supplied callback can fold them into
//! mask bytes.

use super::{attributes, invalid, number, read_text, validate};
use crate::error::{Result, TilesError};
use crate::paths::{combine, directory_of};
use crate::render::RenderBackend;
use crate::tileset::{Tileset, NO_TILE};
use macroquad::math::Vec2;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;

/// Metadata Tiled attaches to a single tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsxTile {
    /// Local tile index within the tileset.
    pub id: u32,
    /// `class` attribute (`type` in files from older Tiled versions).
    pub class: Option<String>,
    /// Custom `<property>` values keyed by name.
    pub properties: HashMap<String, String>,
}

/// Maps a tile's Tiled metadata to its mask byte.
pub type TsxMaskFn<'a> = dyn FnMut(&TsxTile) -> u8 + 'a;

struct TsxDoc {
    root: HashMap<String, String>,
    image: Option<HashMap<String, String>>,
    tiles: Vec<TsxTile>,
}

fn tile_from(path: &Path, attrs: &HashMap<String, String>) -> Result<TsxTile> {
    Ok(TsxTile {
        id: number(path, attrs, "id")?.unwrap_or(0),
        class: attrs
            .get("class")
            .or_else(|| attrs.get("type"))
            .cloned(),
        properties: HashMap::new(),
    })
}

fn parse(path: &Path, text: &str) -> Result<TsxDoc> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut root = None;
    let mut image = None;
    let mut tiles = Vec::new();
    let mut current: Option<TsxTile> = None;
    loop {
        let event = reader.read_event().map_err(|e| TilesError::xml(path, e))?;
        let (element, is_empty) = match event {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(e) => {
                if e.name().as_ref() == b"tile" {
                    tiles.extend(current.take());
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        let attrs = attributes(path, &element)?;
        match element.name().as_ref() {
            b"tileset" if root.is_none() => root = Some(attrs),
            _ if root.is_none() => return Err(invalid(path, "root element is not <tileset>")),
            b"image" if current.is_none() && image.is_none() => image = Some(attrs),
            b"tile" => {
                let tile = tile_from(path, &attrs)?;
                if is_empty {
                    tiles.push(tile);
                } else {
                    current = Some(tile);
                }
            }
            b"property" => {
                if let (Some(tile), Some(name)) = (current.as_mut(), attrs.get("name")) {
                    let value = attrs.get("value").cloned().unwrap_or_default();
                    tile.properties.insert(name.clone(), value);
                }
            }
            _ => {}
        }
    }

    let root = root.ok_or_else(|| invalid(path, "no <tileset> element"))?;
    Ok(TsxDoc { root, image, tiles })
}

/// Tiles along one axis, counted the way Tiled counts them: margin on both
/// sides and spacing only between tiles.
fn tile_count(image: u32, margin: u32, spacing: u32, tile: u32) -> u16 {
    let count = (image + spacing).saturating_sub(2 * margin) / (tile + spacing);
    count.min(u16::MAX as u32) as u16
}

/// Loads a Tiled `.tsx` tileset.
///
/// `mask_fn`, if given, is called once per `<tile>` entry whose id lies in
/// the atlas; its result becomes that tile's mask.
pub fn load_tsx<B: RenderBackend>(
    path: impl AsRef<Path>,
    backend: &mut B,
    mask_fn: Option<&mut TsxMaskFn<'_>>,
) -> Result<Tileset> {
    let path = path.as_ref();
    let text = read_text(path)?;
    let doc = parse(path, &text)?;

    let tile_width: u32 = number(path, &doc.root, "tilewidth")?.unwrap_or(0);
    let tile_height: u32 = number(path, &doc.root, "tileheight")?.unwrap_or(0);
    if tile_width == 0 || tile_height == 0 {
        return Err(invalid(path, "missing or zero `tilewidth`/`tileheight`"));
    }
    let spacing: u32 = number(path, &doc.root, "spacing")?.unwrap_or(0);
    let margin: u32 = number(path, &doc.root, "margin")?.unwrap_or(0);

    let missing_texture = || {
        log::error!("Tileset {} does not specify an image", path.display());
        TilesError::MissingTexture {
            path: path.to_path_buf(),
        }
    };
    let image = doc.image.as_ref().ok_or_else(missing_texture)?;
    let source = image.get("source").ok_or_else(missing_texture)?;
    let declared_width: Option<u32> = number(path, image, "width")?;
    let declared_height: Option<u32> = number(path, image, "height")?;

    let texture = backend.load_texture(&combine(directory_of(path), Path::new(source)))?;
    let image_width = declared_width.unwrap_or(texture.width);
    let image_height = declared_height.unwrap_or(texture.height);
    let dims = (
        tile_count(image_width, margin, spacing, tile_width),
        tile_count(image_height, margin, spacing, tile_height),
    );

    // the atlas math places tile 0 at `set_position - tile_offset`; its
    // extent counts a trailing spacing the Tiled layout does not have
    let slack = Vec2::splat(spacing as f32) / texture.size();
    let mut set = validate(
        path,
        Tileset::from_pixels(
            texture,
            dims,
            Vec2::splat((margin + spacing) as f32),
            Vec2::splat(spacing as f32),
            Vec2::new(tile_width as f32, tile_height as f32),
        ),
        slack,
        backend,
    )?;

    if let Some(mask_fn) = mask_fn {
        for tile in &doc.tiles {
            if tile.id >= set.len() || tile.id >= NO_TILE as u32 {
                log::warn!(
                    "Tile {} in {} is outside the {}x{} atlas",
                    tile.id,
                    path.display(),
                    set.width(),
                    set.height()
                );
                continue;
            }
            set.set_mask(tile.id as u16, mask_fn(tile));
        }
    }

    set.asset_path = Some(path.to_path_buf());
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessBackend;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("tilegrid_tsx_{name}_{nanos}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    const TERRAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset version="1.10" tiledversion="1.10.2" name="terrain" tilewidth="32" tileheight="32" tilecount="64" columns="8">
 <image source="terrain.png" width="256" height="256"/>
 <tile id="3" type="water">
  <properties>
   <property name="solid" type="bool" value="true"/>
  </properties>
 </tile>
 <tile id="9" class="grass"/>
 <tile id="200" class="void"/>
</tileset>
"#;

    #[test]
    fn parse_reads_tiles_and_properties() {
        let doc = parse(Path::new("t.tsx"), TERRAIN).unwrap();
        assert_eq!(doc.tiles.len(), 3);
        assert_eq!(doc.tiles[0].id, 3);
        assert_eq!(doc.tiles[0].class.as_deref(), Some("water"));
        assert_eq!(
            doc.tiles[0].properties.get("solid").map(String::as_str),
            Some("true")
        );
        assert_eq!(doc.tiles[1].class.as_deref(), Some("grass"));
        assert_eq!(
            doc.image.as_ref().and_then(|i| i.get("source")).map(String::as_str),
            Some("terrain.png")
        );
    }

    #[test]
    fn counts_follow_margin_and_spacing() {
        assert_eq!(tile_count(256, 0, 0, 32), 8);
        assert_eq!(tile_count(100, 0, 0, 32), 3);
        assert_eq!(tile_count(74, 1, 2, 16), 4); // 1 + 4*18 - 2 + 1 = 73
        assert_eq!(tile_count(70, 0, 2, 16), 4); // 4*16 + 3*2 = 70
        assert_eq!(tile_count(69, 0, 2, 16), 3);
        assert_eq!(tile_count(72, 1, 2, 16), 4);
        assert_eq!(tile_count(8, 10, 0, 16), 0);
    }

    #[test]
    fn loads_8x8_grid_with_masks() {
        let dir = temp_dir("grid");
        let path = dir.join("terrain.tsx");
        std::fs::write(&path, TERRAIN).unwrap();
        let mut backend = HeadlessBackend::new();
        backend.register_texture(dir.join("terrain.png"), 256, 256);

        let mut seen = Vec::new();
        let mut solid = |tile: &TsxTile| {
            seen.push(tile.id);
            u8::from(tile.properties.get("solid").map(String::as_str) == Some("true"))
        };
        let set = load_tsx(&path, &mut backend, Some(&mut solid)).unwrap();

        assert_eq!((set.width(), set.height()), (8, 8));
        assert_eq!(set.tile_dims(), Vec2::new(32.0, 32.0));
        assert_eq!(set.tile(0).x, 0.0);
        assert_eq!(set.tile(9).x, 32.0 / 256.0);
        assert_eq!(set.mask(3), 1);
        assert_eq!(set.mask(9), 0);
        assert_eq!(seen, vec![3, 9]);
        assert_eq!(set.asset_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn image_size_falls_back_to_texture() {
        let dir = temp_dir("fallback");
        let path = dir.join("small.tsx");
        std::fs::write(
            &path,
            r#"<tileset tilewidth="16" tileheight="8"><image source="img/small.png"/></tileset>"#,
        )
        .unwrap();
        let mut backend = HeadlessBackend::new();
        backend.register_texture(dir.join("img").join("small.png"), 64, 32);

        let set = load_tsx(&path, &mut backend, None).unwrap();
        assert_eq!((set.width(), set.height()), (4, 4));
    }

    #[test]
    fn tight_spaced_image_keeps_last_column() {
        let dir = temp_dir("spaced");
        let path = dir.join("spaced.tsx");
        std::fs::write(
            &path,
            r#"<tileset tilewidth="16" tileheight="16" spacing="2"><image source="s.png" width="70" height="70"/></tileset>"#,
        )
        .unwrap();
        let mut backend = HeadlessBackend::new();
        backend.register_texture(dir.join("s.png"), 70, 70);

        let set = load_tsx(&path, &mut backend, None).unwrap();
        assert_eq!((set.width(), set.height()), (4, 4));
        assert_eq!(set.tile(0).x, 0.0);
        assert!((set.tile(3).x - 54.0 / 70.0).abs() < 1e-6);
        assert_eq!(set.tile(4).x, 0.0);
        assert!((set.tile(4).y - 18.0 / 70.0).abs() < 1e-6);
    }

    #[test]
    fn missing_image_is_an_error() {
        let dir = temp_dir("noimage");
        let path = dir.join("bare.tsx");
        std::fs::write(&path, r#"<tileset tilewidth="16" tileheight="16"/>"#).unwrap();
        let mut backend = HeadlessBackend::new();
        assert!(matches!(
            load_tsx(&path, &mut backend, None),
            Err(TilesError::MissingTexture { .. })
        ));
    }

    #[test]
    fn image_smaller_than_a_tile_is_rejected() {
        let dir = temp_dir("tiny");
        let path = dir.join("tiny.tsx");
        std::fs::write(
            &path,
            r#"<tileset tilewidth="32" tileheight="32"><image source="t.png" width="16" height="16"/></tileset>"#,
        )
        .unwrap();
        let mut backend = HeadlessBackend::new();
        backend.register_texture(dir.join("t.png"), 16, 16);

        assert!(matches!(
            load_tsx(&path, &mut backend, None),
            Err(TilesError::InvalidTileset { .. })
        ));
        assert_eq!(backend.live_textures(), 0);
    }
}
