/*!
 * The per-frame drawing surface handed to every [`crate::renderable::Renderable`].
 *
 * `GraphicsContext` owns the state stack and path builder, and is the only
 * thing a `Renderable` ever touches: it never sees the batcher, the
 * backend, or the engine directly. Everything it emits becomes a
 * [`crate::batch::GeometryRecord`] pushed into the frame's `Batcher`.
 */

mod path;
mod state;

pub use path::{PathBuilder, Polyline};
pub use state::{GraphicsState, StateStack};

use std::sync::Arc;

use crate::batch::{Batcher, GeometryRecord, LayoutId};
use crate::collab::{FontSpec, ImageLoader, TextMetrics, TextRasterizer};
use crate::color::{BasicColorParser, Color, ColorOrNull, ColorParser};
use crate::error::{RenderError, RenderResult};
use crate::geometry::{GeometryBuilder, GeometryData};
use crate::material::{BlendMode, MaterialKey, TextureId};
use crate::math::{Mat3, Rect, Vec2};

/// Segment count for the fast-path `fill_circle`/`stroke_circle` methods.
/// Enough to look smooth at typical screen radii without per-call
/// tessellation budgeting.
const CIRCLE_SEGMENTS: u32 = 32;

/// Drawing surface passed to `Renderable::render`. Mutates the current
/// `GraphicsState`, accumulates path commands, and — on `fill`/`stroke`/the
/// `fill_*`/`stroke_*` fast paths — emits world-space geometry into the
/// frame's `Batcher`.
pub struct GraphicsContext {
    state: StateStack,
    path: PathBuilder,
    batcher: Batcher,
    z_index: i32,
    shader_id: u32,
    color_parser: Arc<dyn ColorParser>,
    text_rasterizer: Box<dyn TextRasterizer>,
    image_loader: Box<dyn ImageLoader>,
    clip: Option<Rect>,
}

impl GraphicsContext {
    pub fn new(batcher: Batcher) -> Self {
        Self {
            state: StateStack::new(),
            path: PathBuilder::new(),
            batcher,
            z_index: 0,
            shader_id: 0,
            color_parser: Arc::new(BasicColorParser),
            text_rasterizer: Box::new(crate::collab::NullTextRasterizer),
            image_loader: Box::new(crate::collab::NullImageLoader),
            clip: None,
        }
    }

    pub fn with_max_stack_depth(mut self, max_depth: usize) -> Self {
        self.state = StateStack::with_max_depth(max_depth);
        self
    }

    pub fn with_color_parser(mut self, parser: Arc<dyn ColorParser>) -> Self {
        self.color_parser = parser;
        self
    }

    pub fn with_text_rasterizer(mut self, rasterizer: Box<dyn TextRasterizer>) -> Self {
        self.text_rasterizer = rasterizer;
        self
    }

    pub fn with_image_loader(mut self, loader: Box<dyn ImageLoader>) -> Self {
        self.image_loader = loader;
        self
    }

    pub fn set_color_parser(&mut self, parser: Arc<dyn ColorParser>) {
        self.color_parser = parser;
    }

    pub fn set_text_rasterizer(&mut self, rasterizer: Box<dyn TextRasterizer>) {
        self.text_rasterizer = rasterizer;
    }

    pub fn set_image_loader(&mut self, loader: Box<dyn ImageLoader>) {
        self.image_loader = loader;
    }

    /// Resets state, path, and clip to frame-start defaults without
    /// touching the batcher's accumulated (not-yet-flushed) records. Called
    /// once per renderable by the engine, and once more at frame start.
    pub fn reset(&mut self) {
        self.state.reset();
        self.path.begin_path();
        self.clip = None;
    }

    /// The z-index the context tags newly emitted geometry with; set by
    /// the engine to the current `Renderable::z_index()` before each call
    /// to `render`.
    pub fn set_current_z_index(&mut self, z: i32) {
        self.z_index = z;
    }

    pub fn batcher_mut(&mut self) -> &mut Batcher {
        &mut self.batcher
    }

    // === state stack ===

    pub fn save(&mut self) -> RenderResult<()> {
        self.state.save()
    }

    pub fn restore(&mut self) -> RenderResult<()> {
        self.state.restore()
    }

    pub fn stack_depth(&self) -> usize {
        self.state.depth()
    }

    // === transform ===

    pub fn translate(&mut self, x: f32, y: f32) {
        let current = self.state.current().transform;
        self.state.current_mut().transform = current.then(&Mat3::from_translation(x, y));
    }

    pub fn rotate(&mut self, radians: f32) {
        let current = self.state.current().transform;
        self.state.current_mut().transform = current.then(&Mat3::from_rotation(radians));
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        let current = self.state.current().transform;
        self.state.current_mut().transform = current.then(&Mat3::from_scale(sx, sy));
    }

    pub fn transform(&mut self, m: Mat3) {
        let current = self.state.current().transform;
        self.state.current_mut().transform = current.then(&m);
    }

    pub fn set_transform(&mut self, m: Mat3) {
        self.state.current_mut().transform = m;
    }

    pub fn reset_transform(&mut self) {
        self.state.current_mut().transform = Mat3::identity();
    }

    pub fn current_transform(&self) -> Mat3 {
        self.state.current().transform
    }

    // === paint ===

    pub fn set_fill(&mut self, color: Color) {
        self.state.current_mut().fill = Some(color);
    }

    pub fn set_fill_str(&mut self, text: &str) -> RenderResult<()> {
        let color = self
            .color_parser
            .parse(text)
            .ok_or_else(|| RenderError::InvalidConfig(format!("unparseable fill color '{}'", text)))?;
        self.set_fill(color);
        Ok(())
    }

    pub fn clear_fill(&mut self) {
        self.state.current_mut().fill = None;
    }

    pub fn set_stroke(&mut self, color: Color) {
        self.state.current_mut().stroke = Some(color);
    }

    pub fn clear_stroke(&mut self) {
        self.state.current_mut().stroke = None;
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.state.current_mut().line_width = width.max(0.0);
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.state.current_mut().opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.current_mut().blend = mode;
    }

    pub fn set_font(&mut self, font: FontSpec) {
        self.state.current_mut().font = font;
    }

    // === path construction ===

    pub fn begin_path(&mut self) {
        self.path.begin_path();
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.path.move_to(x, y);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.path.line_to(x, y);
    }

    pub fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32) {
        self.path.quadratic_curve_to(cpx, cpy, x, y);
    }

    pub fn bezier_curve_to(&mut self, cp1x: f32, cp1y: f32, cp2x: f32, cp2y: f32, x: f32, y: f32) {
        self.path.bezier_curve_to(cp1x, cp1y, cp2x, cp2y, x, y);
    }

    pub fn arc(&mut self, cx: f32, cy: f32, radius: f32, start_angle: f32, end_angle: f32) {
        self.path.arc(cx, cy, radius, start_angle, end_angle);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.path.rect(x, y, w, h);
    }

    pub fn close_path(&mut self) {
        self.path.close_path();
    }

    /// Restricts subsequent draws this frame to `rect`, in the current
    /// transform's local space. A record whose world bounds fall entirely
    /// outside the clip rect is culled instead of emitted.
    pub fn clip_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let transform = self.state.current().transform;
        let corners = [
            transform.transform_point(Vec2::new(x, y)),
            transform.transform_point(Vec2::new(x + w, y)),
            transform.transform_point(Vec2::new(x + w, y + h)),
            transform.transform_point(Vec2::new(x, y + h)),
        ];
        let min_x = corners.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        let max_x = corners.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        let min_y = corners.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        let max_y = corners.iter().map(|p| p.y).fold(f32::MIN, f32::max);
        let world_rect = Rect::new(min_x, min_y, max_x - min_x, max_y - min_y);
        self.clip = Some(match self.clip {
            Some(existing) => intersect_rect(&existing, &world_rect),
            None => world_rect,
        });
    }

    // === fill / stroke of the accumulated path ===

    /// Tessellates every subpath accumulated since the last `begin_path`
    /// and emits one record per subpath using the current fill color.
    /// A subpath with fewer than 3 points contributes nothing.
    pub fn fill(&mut self) {
        let Some(fill) = self.state.current().fill else { return };
        let subpaths: Vec<_> = self.path.subpaths().to_vec();
        for subpath in &subpaths {
            if subpath.points.len() < 3 {
                continue;
            }
            let geometry = GeometryBuilder::polygon_fan(&subpath.points);
            self.emit(geometry, fill, None);
        }
    }

    /// Strokes every subpath accumulated since the last `begin_path` as a
    /// chain of line quads, closing the loop when the subpath was closed.
    pub fn stroke(&mut self) {
        let Some(stroke) = self.state.current().stroke else { return };
        let width = self.state.current().line_width;
        let subpaths: Vec<_> = self.path.subpaths().to_vec();
        for subpath in &subpaths {
            self.stroke_polyline(&subpath.points, subpath.closed, stroke, width);
        }
    }

    fn stroke_polyline(&mut self, points: &[Vec2], closed: bool, color: Color, width: f32) {
        if points.len() < 2 {
            return;
        }
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let mut push_segment = |a: Vec2, b: Vec2| {
            let quad = GeometryBuilder::line_quad(a, b, width);
            if quad.is_empty() {
                return;
            }
            let base = vertices.len() as u16;
            vertices.extend(quad.vertices);
            indices.extend(quad.indices.iter().map(|i| i + base));
        };
        for pair in points.windows(2) {
            push_segment(pair[0], pair[1]);
        }
        if closed {
            push_segment(points[points.len() - 1], points[0]);
        }
        self.emit(GeometryData { vertices, indices }, color, None);
    }

    // === fast-path primitives ===

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let Some(fill) = self.state.current().fill else { return };
        let geometry = translate_geometry(GeometryBuilder::rectangle(w, h), x, y);
        self.emit(geometry, fill, None);
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let Some(stroke) = self.state.current().stroke else { return };
        let width = self.state.current().line_width;
        let corners = [
            Vec2::new(x, y),
            Vec2::new(x + w, y),
            Vec2::new(x + w, y + h),
            Vec2::new(x, y + h),
        ];
        self.stroke_polyline(&corners, true, stroke, width);
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32) {
        let Some(fill) = self.state.current().fill else { return };
        let geometry = translate_geometry(GeometryBuilder::circle(radius, CIRCLE_SEGMENTS), cx, cy);
        self.emit(geometry, fill, None);
    }

    /// Strokes a circle's outline as a ring of line quads — the "fine line
    /// quads" construction, rather than a dedicated annulus mesh, since the
    /// context already has `line_quad` for straight strokes.
    pub fn stroke_circle(&mut self, cx: f32, cy: f32, radius: f32) {
        let Some(stroke) = self.state.current().stroke else { return };
        let width = self.state.current().line_width;
        let geometry = translate_geometry(GeometryBuilder::circle_ring(radius, CIRCLE_SEGMENTS, width), cx, cy);
        self.emit(geometry, stroke, None);
    }

    /// Draws an image previously resolved by the configured `ImageLoader`
    /// into the rectangle `(x, y, w, h)`, local space. No-ops (rather than
    /// erroring) if the texture isn't ready yet, matching the "async loads
    /// never block a frame" invariant.
    pub fn draw_image(&mut self, texture: TextureId, x: f32, y: f32, w: f32, h: f32) {
        if !self.image_loader.is_ready(texture) {
            return;
        }
        let geometry = translate_geometry(GeometryBuilder::rectangle(w, h), x, y);
        self.emit_textured(geometry, texture);
    }

    pub fn load_image(&mut self, source: &str) -> RenderResult<TextureId> {
        self.image_loader.load(source)
    }

    pub fn measure_text(&self, text: &str) -> TextMetrics {
        self.text_rasterizer.measure(text, &self.state.current().font)
    }

    pub fn fill_text(&mut self, text: &str, x: f32, y: f32) -> RenderResult<()> {
        let font = self.state.current().font.clone();
        let texture = self.text_rasterizer.rasterize(text, &font)?;
        let metrics = self.text_rasterizer.measure(text, &font);
        let geometry = translate_geometry(GeometryBuilder::rectangle(metrics.width, metrics.height), x, y);
        self.emit_textured(geometry, texture);
        Ok(())
    }

    /// Outline text is not distinguished from filled text by this engine:
    /// both rasterize through the same collaborator and are drawn as a
    /// textured quad. Kept as a separate method so callers can swap the
    /// active paint (stroke vs. fill) before calling it.
    pub fn stroke_text(&mut self, text: &str, x: f32, y: f32) -> RenderResult<()> {
        self.fill_text(text, x, y)
    }

    pub fn get_image_data(&self, _x: u32, _y: u32, _width: u32, _height: u32) -> RenderResult<Vec<u8>> {
        Err(RenderError::InvalidConfig(
            "get_image_data must be called on the active Backend, not the context".to_string(),
        ))
    }

    pub fn put_image_data(&mut self, _x: u32, _y: u32, _width: u32, _height: u32, _rgba8: &[u8]) -> RenderResult<()> {
        Err(RenderError::InvalidConfig(
            "put_image_data must be called on the active Backend, not the context".to_string(),
        ))
    }

    pub fn present(&mut self) {}

    pub fn dispose(&mut self) {
        self.state.reset();
        self.path.begin_path();
    }

    // === internal ===

    fn emit(&mut self, geometry: GeometryData, color: Color, texture: Option<TextureId>) {
        if geometry.is_empty() {
            return;
        }
        let transform = self.state.current().transform;
        let opacity = self.state.current().opacity;
        let blend = self.state.current().blend;
        let rgba = color.to_array();

        let mut min = Vec2::new(f32::MAX, f32::MAX);
        let mut max = Vec2::new(f32::MIN, f32::MIN);
        let mut vertices = Vec::with_capacity(geometry.vertices.len() * 6);
        for v in &geometry.vertices {
            let world = transform.transform_point(*v);
            min.x = min.x.min(world.x);
            min.y = min.y.min(world.y);
            max.x = max.x.max(world.x);
            max.y = max.y.max(world.y);
            vertices.extend_from_slice(&[world.x, world.y, rgba[0], rgba[1], rgba[2], rgba[3]]);
        }
        let world_bounds = Rect::new(min.x, min.y, (max.x - min.x).max(0.0), (max.y - min.y).max(0.0));

        if let Some(clip) = self.clip {
            if !clip.intersects(&world_bounds) {
                return;
            }
        }

        let material = MaterialKey::new(texture.unwrap_or(0), self.shader_id, blend, self.z_index);
        self.batcher.push(GeometryRecord {
            vertices,
            indices: geometry.indices,
            material,
            world_bounds,
            vertex_layout: LayoutId::PositionColor,
            z_index: self.z_index,
            opacity,
        });
    }

    fn emit_textured(&mut self, geometry: GeometryData, texture: TextureId) {
        if geometry.is_empty() {
            return;
        }
        let transform = self.state.current().transform;
        let opacity = self.state.current().opacity;
        let blend = self.state.current().blend;
        let white = Color::WHITE.to_array();

        // Rectangle UVs in winding order matching `GeometryBuilder::rectangle`.
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let mut min = Vec2::new(f32::MAX, f32::MAX);
        let mut max = Vec2::new(f32::MIN, f32::MIN);
        let mut vertices = Vec::with_capacity(geometry.vertices.len() * 8);
        for (i, v) in geometry.vertices.iter().enumerate() {
            let world = transform.transform_point(*v);
            min.x = min.x.min(world.x);
            min.y = min.y.min(world.y);
            max.x = max.x.max(world.x);
            max.y = max.y.max(world.y);
            let uv = uvs[i % uvs.len()];
            vertices.extend_from_slice(&[world.x, world.y, uv[0], uv[1], white[0], white[1], white[2], white[3]]);
        }
        let world_bounds = Rect::new(min.x, min.y, (max.x - min.x).max(0.0), (max.y - min.y).max(0.0));

        if let Some(clip) = self.clip {
            if !clip.intersects(&world_bounds) {
                return;
            }
        }

        let material = MaterialKey::new(texture, self.shader_id, blend, self.z_index);
        self.batcher.push(GeometryRecord {
            vertices,
            indices: geometry.indices,
            material,
            world_bounds,
            vertex_layout: LayoutId::PositionUvColor,
            z_index: self.z_index,
            opacity,
        });
    }
}

fn translate_geometry(mut geometry: GeometryData, dx: f32, dy: f32) -> GeometryData {
    for v in &mut geometry.vertices {
        *v = Vec2::new(v.x + dx, v.y + dy);
    }
    geometry
}

fn intersect_rect(a: &Rect, b: &Rect) -> Rect {
    let left = a.left().max(b.left());
    let top = a.top().max(b.top());
    let right = a.right().min(b.right());
    let bottom = a.bottom().min(b.bottom());
    Rect::new(left, top, (right - left).max(0.0), (bottom - top).max(0.0))
}
