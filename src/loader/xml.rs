//! Native XML tileset dialect.
//!
//! ```xml
//! <tileset file="atlas.png" dims="8 4" set_position="0 0" tile_offset="2 2" tile_dims="16 16">
//!     <tile x="3" y="1" mask="5"/>
//! </tileset>
//! ```
//!
//! A file may instead hold a single redirect, `<tileset path="other.xml"/>`,
//! which is followed once.

use super::{attributes, invalid, number, read_text, tsx, validate, whole_vector, TilesetDialect};
use crate::error::{Result, TilesError};
use crate::paths::{combine, directory_of, relative_suffix};
use crate::render::RenderBackend;
use crate::tileset::{Tileset, NO_TILE};
use macroquad::math::Vec2;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::path::Path;

struct NativeDoc {
    root: HashMap<String, String>,
    tiles: Vec<HashMap<String, String>>,
}

fn parse(path: &Path, text: &str) -> Result<NativeDoc> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut root = None;
    let mut tiles = Vec::new();
    loop {
        match reader.read_event().map_err(|e| TilesError::xml(path, e))? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                if root.is_none() {
                    if name.as_ref() != b"tileset" {
                        return Err(invalid(path, "root element is not <tileset>"));
                    }
                    root = Some(attributes(path, &e)?);
                } else if name.as_ref() == b"tile" {
                    tiles.push(attributes(path, &e)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let root = root.ok_or_else(|| invalid(path, "no <tileset> element"))?;
    Ok(NativeDoc { root, tiles })
}

/// Loads a native tileset, following at most one `path` redirect.
///
/// The redirect target may be a `.tsx` file. The returned set's
/// `asset_path` is the file that actually described the atlas.
pub fn load_native<B: RenderBackend>(path: impl AsRef<Path>, backend: &mut B) -> Result<Tileset> {
    load_inner(path.as_ref(), backend, None)
}

fn load_inner<B: RenderBackend>(
    path: &Path,
    backend: &mut B,
    redirected_from: Option<&Path>,
) -> Result<Tileset> {
    let text = read_text(path)?;
    let doc = parse(path, &text)?;

    if let Some(redirect) = doc.root.get("path") {
        if let Some(first) = redirected_from {
            log::error!(
                "Tileset {} redirects to {}, which redirects again",
                first.display(),
                path.display()
            );
            return Err(TilesError::RedirectChain {
                path: first.to_path_buf(),
                target: path.to_path_buf(),
            });
        }
        let target = combine(directory_of(path), Path::new(redirect));
        log::debug!("tileset {} redirects to {}", path.display(), target.display());
        return match TilesetDialect::for_path(&target) {
            TilesetDialect::Tiled => tsx::load_tsx(&target, backend, None),
            TilesetDialect::Native => load_inner(&target, backend, Some(path)),
        };
    }

    let file = doc.root.get("file").ok_or_else(|| {
        log::error!("Tileset {} does not specify a texture", path.display());
        TilesError::MissingTexture {
            path: path.to_path_buf(),
        }
    })?;
    // pixel geometry is whole numbers so that saving writes it back unchanged
    let dims =
        whole_vector(path, &doc.root, "dims")?.ok_or_else(|| invalid(path, "missing `dims`"))?;
    let tile_size = whole_vector(path, &doc.root, "tile_dims")?
        .ok_or_else(|| invalid(path, "missing `tile_dims`"))?;
    let set_position = whole_vector(path, &doc.root, "set_position")?.unwrap_or(Vec2::ZERO);
    let tile_offset = whole_vector(path, &doc.root, "tile_offset")?.unwrap_or(Vec2::ZERO);

    if dims.x < 0.0 || dims.y < 0.0 || dims.x > u16::MAX as f32 || dims.y > u16::MAX as f32 {
        return Err(invalid(path, format!("`dims` out of range: {dims}")));
    }
    let dims = (dims.x as u16, dims.y as u16);

    let mut masks = Vec::with_capacity(doc.tiles.len());
    for tile in &doc.tiles {
        let x: u16 = number(path, tile, "x")?.unwrap_or(0);
        let y: u16 = number(path, tile, "y")?.unwrap_or(0);
        let mask: u8 = number(path, tile, "mask")?.unwrap_or(0);
        masks.push((x, y, mask));
    }

    let texture = backend.load_texture(&combine(directory_of(path), Path::new(file)))?;
    let mut set = validate(
        path,
        Tileset::from_pixels(texture, dims, set_position, tile_offset, tile_size),
        Vec2::ZERO,
        backend,
    )?;

    for (x, y, mask) in masks {
        if x >= set.width() || y >= set.height() {
            log::warn!(
                "Mask for tile ({}, {}) is outside the {}x{} tileset {}",
                x,
                y,
                set.width(),
                set.height(),
                path.display()
            );
            continue;
        }
        // u32 math: the grid can hold more cells than a u16 can index
        let index = y as u32 * set.width() as u32 + x as u32;
        if index >= NO_TILE as u32 {
            continue;
        }
        set.set_mask(index as u16, mask);
    }

    set.asset_path = Some(path.to_path_buf());
    Ok(set)
}

fn pixels(v: Vec2) -> String {
    format!("{} {}", v.x.round() as i64, v.y.round() as i64)
}

fn emit(writer: &mut Writer<Vec<u8>>, path: &Path, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| TilesError::xml(path, e))
}

/// Writes `set` to `path` in the native dialect.
///
/// A set loaded from some other file is written as a redirect to that file
/// unless `force_inline` is set. Only non-zero masks are stored.
pub fn save_tileset(path: impl AsRef<Path>, set: &Tileset, force_inline: bool) -> Result<()> {
    let path = path.as_ref();
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    emit(
        &mut writer,
        path,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut root = BytesStart::new("tileset");
    let redirect = set
        .asset_path
        .as_deref()
        .filter(|source| !force_inline && *source != path);

    if let Some(source) = redirect {
        let target = relative_suffix(path, source);
        root.push_attribute(("path", &*target.to_string_lossy()));
        emit(&mut writer, path, Event::Empty(root))?;
    } else {
        let texture = set.texture.as_ref();
        let Some((texture, texture_path)) =
            texture.and_then(|t| t.asset_path.as_deref().map(|p| (t, p)))
        else {
            log::error!("Tileset saved to {} has no texture file", path.display());
            return Err(TilesError::MissingTexture {
                path: path.to_path_buf(),
            });
        };
        let size = texture.size();
        let spacing = Vec2::new(set.tile_box.x, set.tile_box.y);
        let dims = Vec2::new(set.tile_box.w, set.tile_box.h);

        let file = relative_suffix(path, texture_path);
        root.push_attribute(("file", &*file.to_string_lossy()));
        root.push_attribute(("dims", format!("{} {}", set.width(), set.height()).as_str()));
        root.push_attribute(("set_position", pixels(set.offset * size).as_str()));
        root.push_attribute(("tile_offset", pixels(spacing * size).as_str()));
        root.push_attribute(("tile_dims", pixels(dims * size).as_str()));

        let masks: Vec<(usize, u8)> = set
            .tile_mask()
            .map(|m| {
                m.iter()
                    .copied()
                    .enumerate()
                    .filter(|&(_, mask)| mask != 0)
                    .collect()
            })
            .unwrap_or_default();

        if masks.is_empty() {
            emit(&mut writer, path, Event::Empty(root))?;
        } else {
            emit(&mut writer, path, Event::Start(root))?;
            let width = set.width() as usize;
            for (index, mask) in masks {
                let mut tile = BytesStart::new("tile");
                tile.push_attribute(("x", (index % width).to_string().as_str()));
                tile.push_attribute(("y", (index / width).to_string().as_str()));
                tile.push_attribute(("mask", mask.to_string().as_str()));
                emit(&mut writer, path, Event::Empty(tile))?;
            }
            emit(&mut writer, path, Event::End(BytesEnd::new("tileset")))?;
        }
    }

    std::fs::write(path, writer.into_inner()).map_err(|e| {
        log::error!("Failed to write tileset {}", path.display());
        TilesError::io(path, e)
    })
}
