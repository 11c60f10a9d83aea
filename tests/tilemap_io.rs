// tests/tilemap_io.rs

use macroquad_tilegrid::{
    load_tilemap, load_tileset, save_tilemap, HeadlessBackend, Tilemap, TilesError, NO_TILE,
};
use std::fs;
use std::path::PathBuf;

fn temp_dir(name: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    dir.push(format!("tilegrid_{name}_{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Writes a 4x4 tileset of 16px tiles next to a registered 64x64 atlas.
fn write_tileset(dir: &PathBuf, backend: &mut HeadlessBackend) -> PathBuf {
    let path = dir.join("set.xml");
    fs::write(
        &path,
        r#"<tileset file="atlas.png" dims="4 4" tile_dims="16 16"/>"#,
    )
    .unwrap();
    backend.register_texture(dir.join("atlas.png"), 64, 64);
    path
}

fn header(width: u16, height: u16, path: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(&(path.len() as i64).to_le_bytes());
    bytes.extend_from_slice(path.as_bytes());
    bytes
}

#[test]
fn round_trip_keeps_ids_and_tileset() -> anyhow::Result<()> {
    let dir = temp_dir("round_trip");
    let mut backend = HeadlessBackend::new();
    let set_path = write_tileset(&dir, &mut backend);

    let mut map = Tilemap::new(3, 2, &mut backend)?;
    map.set_tileset(load_tileset(&set_path, &mut backend)?);
    map.set_tile(0, 0, 5);
    map.set_tile(2, 1, 15);
    map.set_tile(1, 1, 0);

    let map_path = dir.join("level.dat");
    save_tilemap(&map_path, &map)?;

    let loaded = load_tilemap(&map_path, &mut backend)?;
    assert_eq!((loaded.width(), loaded.height()), (3, 2));
    assert_eq!(loaded.tiles(), map.tiles());
    assert_eq!(loaded.tile(2, 1).id, 15);
    assert_eq!(loaded.tile(1, 0).id, NO_TILE);
    assert_eq!(loaded.tileset().asset_path.as_deref(), Some(set_path.as_path()));
    assert_eq!(loaded.asset_path(), Some(map_path.as_path()));
    Ok(())
}

#[test]
fn file_length_matches_layout() -> anyhow::Result<()> {
    let dir = temp_dir("layout");
    let mut backend = HeadlessBackend::new();
    let set_path = write_tileset(&dir, &mut backend);

    let mut map = Tilemap::new(5, 4, &mut backend)?;
    map.set_tileset(load_tileset(&set_path, &mut backend)?);
    let map_path = dir.join("level.dat");
    save_tilemap(&map_path, &map)?;

    let bytes = fs::read(&map_path)?;
    assert_eq!(bytes.len(), 12 + "set.xml".len() + 5 * 4 * 2);
    Ok(())
}

#[test]
fn zero_path_length_gives_map_without_tileset() -> anyhow::Result<()> {
    let dir = temp_dir("no_tileset");
    let path = dir.join("empty.dat");
    fs::write(&path, header(3, 2, ""))?;

    let mut backend = HeadlessBackend::new();
    let map = load_tilemap(&path, &mut backend)?;
    assert_eq!((map.width(), map.height()), (3, 2));
    assert!(map.tileset().is_empty());
    assert!(map.tiles().iter().all(|t| t.id == NO_TILE));
    Ok(())
}

#[test]
fn truncated_records_keep_what_was_read() -> anyhow::Result<()> {
    let dir = temp_dir("truncated");
    let mut backend = HeadlessBackend::new();
    write_tileset(&dir, &mut backend);

    let mut bytes = header(2, 2, "set.xml");
    bytes.extend_from_slice(&3u16.to_le_bytes());
    bytes.extend_from_slice(&7u16.to_le_bytes());
    bytes.push(1); // half a record
    let path = dir.join("short.dat");
    fs::write(&path, bytes)?;

    let map = load_tilemap(&path, &mut backend)?;
    assert_eq!(map.tile(0, 0).id, 3);
    assert_eq!(map.tile(1, 0).id, 7);
    assert_eq!(map.tile(0, 1).id, NO_TILE);
    assert_eq!(map.tile(1, 1).id, NO_TILE);
    Ok(())
}

#[test]
fn bad_header_is_an_error() {
    let dir = temp_dir("bad_header");
    let path = dir.join("bad.dat");
    fs::write(&path, [4u8, 0, 4]).unwrap();

    let mut backend = HeadlessBackend::new();
    let err = load_tilemap(&path, &mut backend).unwrap_err();
    assert!(matches!(err, TilesError::InvalidHeader { .. }), "{err:?}");
}

#[test]
fn zero_dimensions_are_rejected() {
    let dir = temp_dir("zero_dims");
    let path = dir.join("zero.dat");
    fs::write(&path, header(0, 4, "")).unwrap();

    let mut backend = HeadlessBackend::new();
    assert!(matches!(
        load_tilemap(&path, &mut backend),
        Err(TilesError::InvalidDimensions { width: 0, height: 4 })
    ));
}

#[test]
fn missing_tileset_fails_and_frees_buffer() {
    let dir = temp_dir("missing_set");
    let path = dir.join("level.dat");
    fs::write(&path, header(2, 2, "nowhere.xml")).unwrap();

    let mut backend = HeadlessBackend::new();
    let err = load_tilemap(&path, &mut backend).unwrap_err();
    assert!(matches!(err, TilesError::Io { .. }), "{err:?}");
    assert_eq!(backend.live_buffers(), 0);
}

#[test]
fn missing_file_is_io_error() {
    let mut backend = HeadlessBackend::new();
    let err = load_tilemap(temp_dir("missing").join("nope.dat"), &mut backend).unwrap_err();
    assert!(matches!(err, TilesError::Io { .. }));
}
