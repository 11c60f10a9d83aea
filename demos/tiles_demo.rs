use macroquad::prelude::*;
use macroquad_tilegrid::{
    load_tilemap, load_tileset, save_tilemap, MacroquadBackend, RenderContext, Tilemap,
    TilesConfig,
};

fn window_conf() -> Conf {
    Conf {
        window_title: "Tile Grid".into(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

fn randomize(map: &mut Tilemap) {
    let count = map.tileset().len().min(u16::MAX as u32) as u16;
    if count == 0 {
        return;
    }
    for y in 0..map.height() {
        for x in 0..map.width() {
            map.set_tile(x, y, rand::gen_range(0, count));
        }
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    let config = TilesConfig::from_file("assets/tiles.json").unwrap_or_default();
    let mut ctx = RenderContext::new(MacroquadBackend::with_config(&config));

    // R: new random layout, S: save
    let mut map = match load_tilemap(config.tilemap_path(), ctx.backend_mut()) {
        Ok(map) => map,
        Err(e) => {
            log::warn!("{e}; starting a new map");
            let mut map = Tilemap::new(config.map_width, config.map_height, ctx.backend_mut())
                .expect("map dimensions");
            let tileset =
                load_tileset(config.tileset_path(), ctx.backend_mut()).expect("tileset");
            map.set_tileset(tileset);
            randomize(&mut map);
            map
        }
    };

    loop {
        clear_background(BLACK);

        if is_key_pressed(KeyCode::R) {
            randomize(&mut map);
        }
        if is_key_pressed(KeyCode::S) {
            if let Err(e) = save_tilemap(config.tilemap_path(), &map) {
                log::error!("{e}");
            }
        }

        let size = map.tileset().tile_dims() * vec2(map.width() as f32, map.height() as f32);
        let origin = (vec2(screen_width(), screen_height()) - size) * 0.5;
        let view = Camera2D::from_display_rect(Rect::new(0.0, 0.0, screen_width(), screen_height()))
            .matrix();
        let model = Mat4::from_translation(vec3(origin.x, origin.y, 0.0));
        if let Err(e) = map.draw_default(&mut ctx, model, view) {
            log::error!("{e}");
            break;
        }

        draw_text(
            &format!("FPS: {}", get_fps()),
            screen_width() - 135.0,
            55.0,
            30.0,
            RED,
        );

        next_frame().await;
    }

    map.free(ctx.backend_mut(), true);
}
