//! Binary tilemap files.
//!
//! Little-endian layout:
//!
//! | field        | type              |
//! |--------------|-------------------|
//! | width        | `u16`             |
//! | height       | `u16`             |
//! | path length  | `i64`             |
//! | tileset path | UTF-8, no NUL     |
//! | tile ids     | `u16` × w·h, row-major |
//!
//! The tileset path is relative to the tilemap's folder. A zero length
//! means no tileset, and no tile records follow.

use super::load_tileset;
use crate::error::{Result, TilesError};
use crate::map::Tilemap;
use crate::paths::{combine, directory_of, relative_suffix};
use crate::render::RenderBackend;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, PartialEq)]
struct Header {
    width: u16,
    height: u16,
    tileset_path: Option<String>,
}

fn read_header<R: Read>(reader: &mut R) -> std::result::Result<Header, String> {
    let mut short = [0u8; 2];
    let mut long = [0u8; 8];

    reader
        .read_exact(&mut short)
        .map_err(|_| "Invalid Header".to_owned())?;
    let width = u16::from_le_bytes(short);
    reader
        .read_exact(&mut short)
        .map_err(|_| "Invalid Header".to_owned())?;
    let height = u16::from_le_bytes(short);
    reader
        .read_exact(&mut long)
        .map_err(|_| "Invalid Header".to_owned())?;
    let len = i64::from_le_bytes(long);

    if len < 0 {
        return Err(format!("negative tileset path length {len}"));
    }
    if len == 0 {
        return Ok(Header {
            width,
            height,
            tileset_path: None,
        });
    }

    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut bytes)
        .map_err(|e| e.to_string())?;
    if bytes.len() as u64 != len as u64 {
        return Err(format!(
            "Size mismatch in tileset path ({} != {})",
            bytes.len(),
            len
        ));
    }
    let path = String::from_utf8(bytes).map_err(|_| "tileset path is not UTF-8".to_owned())?;
    Ok(Header {
        width,
        height,
        tileset_path: Some(path),
    })
}

/// Loads a tilemap and the tileset it references.
///
/// A file that ends inside the tile records still loads: the cells that
/// were read are kept and a warning is logged.
pub fn load_tilemap<B: RenderBackend>(path: impl AsRef<Path>, backend: &mut B) -> Result<Tilemap> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        log::error!("Can't open tilemap file at {}", path.display());
        TilesError::io(path, e)
    })?;
    let mut reader = BufReader::new(file);

    let header = read_header(&mut reader).map_err(|reason| {
        log::error!("Can't load tilemap at {}: {}", path.display(), reason);
        TilesError::InvalidHeader {
            path: path.to_path_buf(),
            reason,
        }
    })?;

    let mut map = Tilemap::new(header.width, header.height, backend)?;
    map.set_asset_path(Some(path.to_path_buf()));

    let Some(relative) = header.tileset_path else {
        return Ok(map);
    };
    let tileset_path = combine(directory_of(path), Path::new(&relative));
    let tileset = match load_tileset(&tileset_path, backend) {
        Ok(tileset) => tileset,
        Err(e) => {
            map.free(backend, false);
            return Err(e);
        }
    };
    map.set_tileset(tileset);

    let width = header.width as u32;
    let cells = width * header.height as u32;
    let mut record = [0u8; 2];
    for index in 0..cells {
        if reader.read_exact(&mut record).is_err() {
            log::warn!(
                "Unexpected end of file while reading tile data. Tilemap {} may be incomplete ({} of {} tiles read)",
                path.display(),
                index,
                cells
            );
            break;
        }
        map.set_tile(
            (index % width) as u16,
            (index / width) as u16,
            u16::from_le_bytes(record),
        );
    }

    log::debug!(
        "loaded {}x{} tilemap {}",
        header.width,
        header.height,
        path.display()
    );
    Ok(map)
}

fn encode(path: &Path, map: &Tilemap) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + map.tiles().len() * 2);
    out.extend_from_slice(&map.width().to_le_bytes());
    out.extend_from_slice(&map.height().to_le_bytes());

    let Some(tileset_path) = map.tileset().asset_path.as_deref() else {
        out.extend_from_slice(&0i64.to_le_bytes());
        return out;
    };

    let relative = relative_suffix(path, tileset_path);
    let relative = relative.to_string_lossy();
    out.extend_from_slice(&(relative.len() as i64).to_le_bytes());
    out.extend_from_slice(relative.as_bytes());
    for tile in map.tiles() {
        out.extend_from_slice(&tile.id.to_le_bytes());
    }
    out
}

/// Writes `map` to `path`.
///
/// The tileset itself is not saved; only its path relative to `path`.
pub fn save_tilemap(path: impl AsRef<Path>, map: &Tilemap) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, encode(path, map)).map_err(|e| {
        log::error!("Failed to write tilemap {}", path.display());
        TilesError::io(path, e)
    })
}
