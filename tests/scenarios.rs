//! End-to-end pixel and stats assertions against `SoftwareBackend`, one per
//! concrete scene shape the engine is expected to handle correctly.

use std::sync::atomic::{AtomicBool, Ordering};

use render2d::backend::SoftwareBackend;
use render2d::collab::{ImageLoader, TextMetrics, TextRasterizer};
use render2d::config::BatchStrategy;
use render2d::material::TextureId;
use render2d::math::Rect;
use render2d::{Color, EngineConfig, GraphicsContext, Renderable, RenderEngine, Viewport};

fn engine(width: u32, height: u32, strategy: BatchStrategy) -> RenderEngine<SoftwareBackend> {
    let backend = SoftwareBackend::new(width, height);
    let viewport = Viewport::new(0.0, 0.0, width as f32, height as f32);
    let config = EngineConfig::default().with_batch_strategy(strategy);
    RenderEngine::initialize(backend, viewport, config).unwrap()
}

struct FnRenderable<F: Fn(&mut GraphicsContext)> {
    id: String,
    bounds: Rect,
    z_index: i32,
    draw: F,
}

impl<F: Fn(&mut GraphicsContext)> Renderable for FnRenderable<F> {
    fn id(&self) -> &str {
        &self.id
    }
    fn bounds(&self) -> Rect {
        self.bounds
    }
    fn z_index(&self) -> i32 {
        self.z_index
    }
    fn render(&self, ctx: &mut GraphicsContext) {
        (self.draw)(ctx)
    }
}

#[test]
fn single_filled_rectangle_draws_exact_pixels() {
    let mut eng = engine(800, 600, BatchStrategy::Basic);
    eng.add_layer("main", 0).unwrap();
    eng.get_layer_mut("main").unwrap().add(Box::new(FnRenderable {
        id: "rect".into(),
        bounds: Rect::new(100.0, 100.0, 200.0, 50.0),
        z_index: 0,
        draw: |ctx| {
            ctx.set_fill_str("#FF0000").unwrap();
            ctx.fill_rect(100.0, 100.0, 200.0, 50.0);
        },
    })).unwrap();
    eng.render().unwrap();

    let stats = eng.get_stats();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.vertices, 4);
    assert_eq!(stats.triangles, 2);
    assert_eq!(eng.backend().pixel(150, 125), [255, 0, 0, 255]);
    assert_eq!(eng.backend().pixel(50, 50), [0, 0, 0, 0]);
}

#[test]
fn many_rectangles_sharing_a_shader_batch_together() {
    // Same default shader/blend for every rect means they all share one
    // `MaterialKey` regardless of per-vertex fill color, so even `BASIC`
    // collapses them into a single batch.
    let mut eng = engine(800, 600, BatchStrategy::Enhanced);
    eng.add_layer("main", 0).unwrap();
    let layer = eng.get_layer_mut("main").unwrap();
    for i in 0..100 {
        let x = (i % 20) as f32 * 10.0;
        let y = (i / 20) as f32 * 10.0;
        layer.add(Box::new(FnRenderable {
            id: format!("rect-{i}"),
            bounds: Rect::new(x, y, 8.0, 8.0),
            z_index: 0,
            draw: move |ctx| {
                ctx.set_fill(if i % 2 == 0 { Color::RED } else { Color::BLUE });
                ctx.fill_rect(x, y, 8.0, 8.0);
            },
        })).unwrap();
    }
    eng.render().unwrap();
    let stats = eng.get_stats();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.vertices, 400);
}

#[test]
fn rectangles_batch_under_basic_strategy_too() {
    let mut eng = engine(800, 600, BatchStrategy::Basic);
    eng.add_layer("main", 0).unwrap();
    let layer = eng.get_layer_mut("main").unwrap();
    for i in 0..100 {
        layer.add(Box::new(FnRenderable {
            id: format!("rect-{i}"),
            bounds: Rect::new(0.0, 0.0, 8.0, 8.0),
            z_index: 0,
            draw: |ctx| {
                ctx.set_fill(Color::GREEN);
                ctx.fill_rect(0.0, 0.0, 8.0, 8.0);
            },
        })).unwrap();
    }
    eng.render().unwrap();
    assert_eq!(eng.get_stats().batches, 1);
}

struct ReadyLoader {
    texture: TextureId,
}

impl ImageLoader for ReadyLoader {
    fn load(&mut self, _source: &str) -> render2d::error::RenderResult<TextureId> {
        Ok(self.texture)
    }
    fn is_ready(&self, texture: TextureId) -> bool {
        texture == self.texture
    }
}

fn solid_rgba8(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..(width * height) {
        out.extend_from_slice(&rgba);
    }
    out
}

#[test]
fn identical_sprites_past_instancing_threshold_collapse_to_one_draw_call() {
    let mut eng = engine(800, 600, BatchStrategy::Instanced);
    let texture = eng.create_texture(4, 4, &solid_rgba8(4, 4, [255, 255, 0, 255])).unwrap();
    eng.context_mut().set_image_loader(Box::new(ReadyLoader { texture }));

    eng.add_layer("main", 0).unwrap();
    let layer = eng.get_layer_mut("main").unwrap();
    for i in 0..60 {
        let x = (i % 10) as f32 * 12.0;
        let y = (i / 10) as f32 * 12.0;
        layer.add(Box::new(FnRenderable {
            id: format!("sprite-{i}"),
            bounds: Rect::new(x, y, 10.0, 10.0),
            z_index: 0,
            draw: move |ctx| ctx.draw_image(texture, x, y, 10.0, 10.0),
        })).unwrap();
    }
    eng.render().unwrap();

    let stats = eng.get_stats();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.instanced_count, 60);
}

#[test]
fn instanced_sprites_without_strategy_enabled_stay_non_instanced_but_still_batch() {
    let mut eng = engine(800, 600, BatchStrategy::Enhanced);
    let texture = eng.create_texture(4, 4, &solid_rgba8(4, 4, [255, 255, 0, 255])).unwrap();
    eng.context_mut().set_image_loader(Box::new(ReadyLoader { texture }));

    eng.add_layer("main", 0).unwrap();
    let layer = eng.get_layer_mut("main").unwrap();
    for i in 0..60 {
        let x = (i % 10) as f32 * 12.0;
        let y = (i / 10) as f32 * 12.0;
        layer.add(Box::new(FnRenderable {
            id: format!("sprite-{i}"),
            bounds: Rect::new(x, y, 10.0, 10.0),
            z_index: 0,
            draw: move |ctx| ctx.draw_image(texture, x, y, 10.0, 10.0),
        })).unwrap();
    }
    eng.render().unwrap();

    let stats = eng.get_stats();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.vertices, 240);
    assert_eq!(stats.instanced_count, 0);
}

#[test]
fn higher_z_index_textured_sprite_overlays_lower_z_index_fill_and_flushes_after_it() {
    let mut eng = engine(200, 200, BatchStrategy::Basic);
    let texture = eng.create_texture(2, 2, &solid_rgba8(2, 2, [0, 0, 255, 255])).unwrap();
    eng.context_mut().set_image_loader(Box::new(ReadyLoader { texture }));

    eng.add_layer("main", 0).unwrap();
    let layer = eng.get_layer_mut("main").unwrap();
    layer.add(Box::new(FnRenderable {
        id: "red".into(),
        bounds: Rect::new(0.0, 0.0, 200.0, 200.0),
        z_index: 0,
        draw: |ctx| {
            ctx.set_fill(Color::RED);
            ctx.fill_rect(0.0, 0.0, 200.0, 200.0);
        },
    })).unwrap();
    layer.add(Box::new(FnRenderable {
        id: "blue-sprite".into(),
        bounds: Rect::new(50.0, 50.0, 100.0, 100.0),
        z_index: 10,
        draw: move |ctx| ctx.draw_image(texture, 50.0, 50.0, 100.0, 100.0),
    })).unwrap();
    eng.render().unwrap();

    assert_eq!(eng.get_stats().draw_calls, 2);
    assert_eq!(eng.backend().pixel(100, 100), [0, 0, 255, 255]);
    assert_eq!(eng.backend().pixel(10, 10), [255, 0, 0, 255]);
}

static SAVE_WITHOUT_RESTORE_RAN: AtomicBool = AtomicBool::new(false);

struct LeavesStackDirty;

impl Renderable for LeavesStackDirty {
    fn id(&self) -> &str {
        "leaky"
    }
    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, 10.0, 10.0)
    }
    fn render(&self, ctx: &mut GraphicsContext) {
        ctx.save().unwrap();
        ctx.translate(1000.0, 1000.0);
        SAVE_WITHOUT_RESTORE_RAN.store(true, Ordering::SeqCst);
    }
}

#[test]
fn unbalanced_save_is_rebalanced_before_the_next_renderable() {
    let mut eng = engine(100, 100, BatchStrategy::Basic);
    eng.add_layer("main", 0).unwrap();
    let layer = eng.get_layer_mut("main").unwrap();
    layer.add(Box::new(LeavesStackDirty)).unwrap();
    eng.render().unwrap();
    assert!(SAVE_WITHOUT_RESTORE_RAN.load(Ordering::SeqCst));
    // render() completing without error, with a fresh context next frame,
    // is itself evidence the engine rebalanced the stack rather than
    // propagating the imbalance.
    eng.render().unwrap();
}

#[test]
fn renderable_outside_viewport_is_culled_and_never_rendered() {
    let mut eng = engine(800, 600, BatchStrategy::Basic);
    eng.add_layer("main", 0).unwrap();
    let rendered = std::rc::Rc::new(std::cell::Cell::new(false));
    let rendered_clone = rendered.clone();
    eng.get_layer_mut("main").unwrap().add(Box::new(FnRenderable {
        id: "offscreen".into(),
        bounds: Rect::new(-1000.0, -1000.0, 10.0, 10.0),
        z_index: 0,
        draw: move |_ctx| rendered_clone.set(true),
    })).unwrap();
    eng.render().unwrap();
    assert!(!rendered.get());
    assert_eq!(eng.get_stats().culled, 1);
}

struct StubTextRasterizer;

impl TextRasterizer for StubTextRasterizer {
    fn measure(&self, text: &str, _style: &render2d::collab::FontSpec) -> TextMetrics {
        TextMetrics { width: text.len() as f32 * 8.0, height: 16.0 }
    }
    fn rasterize(&mut self, _text: &str, _style: &render2d::collab::FontSpec) -> render2d::error::RenderResult<TextureId> {
        Ok(1)
    }
}

#[test]
fn text_rasterizer_collaborator_is_used_for_fill_text() {
    let mut eng = engine(200, 200, BatchStrategy::Basic);
    eng.context_mut().set_text_rasterizer(Box::new(StubTextRasterizer));
    eng.add_layer("main", 0).unwrap();
    eng.get_layer_mut("main").unwrap().add(Box::new(FnRenderable {
        id: "label".into(),
        bounds: Rect::new(0.0, 0.0, 50.0, 20.0),
        z_index: 0,
        draw: |ctx| {
            ctx.fill_text("hi", 0.0, 0.0).unwrap();
        },
    })).unwrap();
    eng.render().unwrap();
    assert_eq!(eng.get_stats().draw_calls, 1);
}
