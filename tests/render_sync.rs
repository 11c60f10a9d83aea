// tests/render_sync.rs

use macroquad::math::{Mat4, Vec2, Vec3};
use macroquad_tilegrid::render::Uniform;
use macroquad_tilegrid::{
    load_tileset, DirtyState, HeadlessBackend, RenderContext, Tilemap, NO_TILE,
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

fn map_4x4(ctx: &mut RenderContext<HeadlessBackend>) -> anyhow::Result<Tilemap> {
    let dir = temp_dir("render");
    fs::write(
        dir.join("set.xml"),
        r#"<tileset file="atlas.png" dims="4 4" tile_dims="16 16"/>"#,
    )?;
    ctx.backend_mut().register_texture(dir.join("atlas.png"), 64, 64);

    let mut map = Tilemap::new(4, 4, ctx.backend_mut())?;
    map.set_tileset(load_tileset(dir.join("set.xml"), ctx.backend_mut())?);
    Ok(map)
}

#[test]
fn single_tile_draws_one_point() -> anyhow::Result<()> {
    let mut ctx = RenderContext::new(HeadlessBackend::new());
    let mut map = map_4x4(&mut ctx)?;

    map.set_tile(1, 2, 5);
    assert_eq!(map.dirty_state(), DirtyState::MeshDirty);
    map.draw_default(&mut ctx, Mat4::IDENTITY, Mat4::IDENTITY)?;
    assert_eq!(map.dirty_state(), DirtyState::Clean);

    let backend = ctx.backend();
    let draw = backend.draws().last().expect("draw call");
    assert_eq!(draw.points, 1);
    assert_eq!(backend.mesh_points(draw.mesh), Some(&[Vec3::new(1.0, 2.0, 0.0)][..]));
    assert_eq!(backend.uniform("u_dims"), Some(Uniform::Vec2(Vec2::new(16.0, 16.0))));

    let uvs = backend
        .buffer_contents(draw.uv_buffer.expect("uv buffer"))
        .expect("buffer");
    assert_eq!(uvs, &[map.tileset().tile(5)]);
    Ok(())
}

#[test]
fn id_swap_refreshes_uvs_without_new_mesh() -> anyhow::Result<()> {
    let mut ctx = RenderContext::new(HeadlessBackend::new());
    let mut map = map_4x4(&mut ctx)?;

    map.set_tile(1, 2, 5);
    map.draw_default(&mut ctx, Mat4::IDENTITY, Mat4::IDENTITY)?;
    let meshes = ctx.backend().mesh_uploads();

    map.set_tile(1, 2, 6);
    assert_eq!(map.dirty_state(), DirtyState::TilesDirty);
    map.draw_default(&mut ctx, Mat4::IDENTITY, Mat4::IDENTITY)?;

    let backend = ctx.backend();
    assert_eq!(backend.mesh_uploads(), meshes);
    let draw = backend.draws().last().expect("draw call");
    let uvs = backend
        .buffer_contents(draw.uv_buffer.expect("uv buffer"))
        .expect("buffer");
    assert_eq!(uvs, &[map.tileset().tile(6)]);
    Ok(())
}

#[test]
fn clearing_last_tile_stops_drawing() -> anyhow::Result<()> {
    let mut ctx = RenderContext::new(HeadlessBackend::new());
    let mut map = map_4x4(&mut ctx)?;

    map.set_tile(3, 3, 1);
    map.draw_default(&mut ctx, Mat4::IDENTITY, Mat4::IDENTITY)?;
    let draws = ctx.backend().draws().len();

    map.set_tile(3, 3, NO_TILE);
    map.draw_default(&mut ctx, Mat4::IDENTITY, Mat4::IDENTITY)?;
    assert!(map.is_empty());
    assert_eq!(ctx.backend().draws().len(), draws);
    assert_eq!(ctx.backend().live_meshes(), 0);
    Ok(())
}

#[test]
fn shader_is_shared_between_maps() -> anyhow::Result<()> {
    let mut ctx = RenderContext::new(HeadlessBackend::new());
    let mut a = map_4x4(&mut ctx)?;
    let mut b = map_4x4(&mut ctx)?;
    a.set_tile(0, 0, 0);
    b.set_tile(0, 0, 0);

    a.draw_default(&mut ctx, Mat4::IDENTITY, Mat4::IDENTITY)?;
    b.draw_default(&mut ctx, Mat4::IDENTITY, Mat4::IDENTITY)?;
    assert_eq!(ctx.backend().shader_compiles(), 1);
    assert_eq!(ctx.backend().draws().len(), 2);

    a.free(ctx.backend_mut(), true);
    b.free(ctx.backend_mut(), true);
    assert_eq!(ctx.backend().live_buffers(), 0);
    assert_eq!(ctx.backend().live_textures(), 0);
    assert_eq!(ctx.backend().invalid_frees(), 0);
    Ok(())
}
