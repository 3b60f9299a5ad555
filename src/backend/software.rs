//! Deterministic CPU rasterizer. Used by the test suite for pixel-level
//! assertions that would be backend-dependent (and therefore flaky) against
//! a real GPU.

use std::collections::HashMap;

use crate::batch::{Batch, LayoutId};
use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::gpu::shaders::{Defines, ShaderCompiler, ShaderReflection, ShaderSource};
use crate::gpu::{BufferManager, ShaderManager};
use crate::material::{BlendMode, TextureId};
use crate::math::Vec2;
use crate::viewport::Viewport;

use super::Backend;

struct Texture {
    width: u32,
    height: u32,
    rgba8: Vec<u8>,
}

/// A CPU-side RGBA8 framebuffer with a scanline triangle rasterizer.
///
/// Blend modes are applied per pixel: `Opaque` overwrites, `Alpha`
/// source-over blends, `Additive` adds and clamps. There is no
/// anti-aliasing — coverage is a strict inside/outside test against the
/// triangle's edge functions, which keeps pixel assertions exact.
pub struct SoftwareBackend {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    textures: HashMap<TextureId, Texture>,
    next_texture_id: TextureId,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; (width * height * 4) as usize],
            textures: HashMap::new(),
            next_texture_id: 1,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reads a single pixel as `[r, g, b, a]`, for test assertions.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = self.offset(x, y);
        [self.pixels[offset], self.pixels[offset + 1], self.pixels[offset + 2], self.pixels[offset + 3]]
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        ((y * self.width + x) * 4) as usize
    }

    fn blend_pixel(&mut self, x: u32, y: u32, color: [f32; 4], mode: BlendMode) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = self.offset(x, y);
        let src = color;
        let dst = [
            self.pixels[offset] as f32 / 255.0,
            self.pixels[offset + 1] as f32 / 255.0,
            self.pixels[offset + 2] as f32 / 255.0,
            self.pixels[offset + 3] as f32 / 255.0,
        ];
        let out = match mode {
            BlendMode::Opaque => src,
            BlendMode::Alpha => {
                let a = src[3];
                [
                    src[0] * a + dst[0] * (1.0 - a),
                    src[1] * a + dst[1] * (1.0 - a),
                    src[2] * a + dst[2] * (1.0 - a),
                    a + dst[3] * (1.0 - a),
                ]
            }
            BlendMode::Additive => [
                (src[0] + dst[0]).min(1.0),
                (src[1] + dst[1]).min(1.0),
                (src[2] + dst[2]).min(1.0),
                (src[3] + dst[3]).min(1.0),
            ],
        };
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.pixels[offset] = quantize(out[0]);
        self.pixels[offset + 1] = quantize(out[1]);
        self.pixels[offset + 2] = quantize(out[2]);
        self.pixels[offset + 3] = quantize(out[3]);
    }

    #[allow(clippy::too_many_arguments)]
    fn rasterize_triangle(
        &mut self,
        screen: [Vec2; 3],
        colors: [[f32; 4]; 3],
        uvs: Option<[[f32; 2]; 3]>,
        texture: Option<&(u32, u32, Vec<u8>)>,
        mode: BlendMode,
    ) {
        let min_x = screen.iter().map(|p| p.x).fold(f32::MAX, f32::min).floor().max(0.0) as u32;
        let max_x = screen.iter().map(|p| p.x).fold(f32::MIN, f32::max).ceil().min(self.width as f32) as u32;
        let min_y = screen.iter().map(|p| p.y).fold(f32::MAX, f32::min).floor().max(0.0) as u32;
        let max_y = screen.iter().map(|p| p.y).fold(f32::MIN, f32::max).ceil().min(self.height as f32) as u32;

        let area = edge(screen[0], screen[1], screen[2]);
        if area.abs() < 1e-6 {
            return;
        }

        for y in min_y..max_y {
            for x in min_x..max_x {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(screen[1], screen[2], p);
                let w1 = edge(screen[2], screen[0], p);
                let w2 = edge(screen[0], screen[1], p);
                let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0) || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
                if !inside {
                    continue;
                }
                let (b0, b1, b2) = (w0 / area, w1 / area, w2 / area);
                let mut color = [
                    b0 * colors[0][0] + b1 * colors[1][0] + b2 * colors[2][0],
                    b0 * colors[0][1] + b1 * colors[1][1] + b2 * colors[2][1],
                    b0 * colors[0][2] + b1 * colors[1][2] + b2 * colors[2][2],
                    b0 * colors[0][3] + b1 * colors[1][3] + b2 * colors[2][3],
                ];
                if let (Some(uv), Some((tw, th, data))) = (uvs, texture) {
                    let u = b0 * uv[0][0] + b1 * uv[1][0] + b2 * uv[2][0];
                    let v = b0 * uv[0][1] + b1 * uv[1][1] + b2 * uv[2][1];
                    let texel = sample_nearest(*tw, *th, data, u, v);
                    color = [color[0] * texel[0], color[1] * texel[1], color[2] * texel[2], color[3] * texel[3]];
                }
                self.blend_pixel(x, y, color, mode);
            }
        }
    }

    fn draw_batch(&mut self, batch: &Batch, viewport: &Viewport) {
        if batch.instanced {
            self.draw_instanced_batch(batch, viewport);
            return;
        }
        let texture = self.textures.get(&batch.key.texture_id).map(|t| (t.width, t.height, t.rgba8.clone()));
        for record in &batch.records {
            let stride = record.vertex_layout.floats_per_vertex();
            let (color_offset, uv_offset) = match record.vertex_layout {
                LayoutId::PositionColor => (2, None),
                LayoutId::PositionUvColor => (4, Some(2)),
            };
            let vertex_count = record.vertices.len() / stride;
            let mut screen = Vec::with_capacity(vertex_count);
            let mut colors = Vec::with_capacity(vertex_count);
            let mut uvs = Vec::with_capacity(vertex_count);
            for v in 0..vertex_count {
                let base = v * stride;
                let world = Vec2::new(record.vertices[base], record.vertices[base + 1]);
                screen.push(viewport.world_to_screen(world));
                colors.push([
                    record.vertices[base + color_offset],
                    record.vertices[base + color_offset + 1],
                    record.vertices[base + color_offset + 2],
                    record.vertices[base + color_offset + 3] * record.opacity,
                ]);
                if let Some(uo) = uv_offset {
                    uvs.push([record.vertices[base + uo], record.vertices[base + uo + 1]]);
                }
            }
            for tri in record.indices.chunks(3) {
                if tri.len() < 3 {
                    continue;
                }
                let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
                let tri_uvs = uv_offset.map(|_| [uvs[i0], uvs[i1], uvs[i2]]);
                self.rasterize_triangle(
                    [screen[i0], screen[i1], screen[i2]],
                    [colors[i0], colors[i1], colors[i2]],
                    tri_uvs,
                    texture.as_ref(),
                    batch.key.blend_mode,
                );
            }
        }
    }

    /// Draws one instanced batch by rasterizing the template record's
    /// triangles once per `InstanceData`, translating/scaling the
    /// template's vertices (relative to its own center) by each instance's
    /// transform rather than reading per-record vertex data.
    fn draw_instanced_batch(&mut self, batch: &Batch, viewport: &Viewport) {
        let (Some(instances), Some(template)) = (&batch.instances, batch.records.first()) else {
            return;
        };
        let texture = self.textures.get(&batch.key.texture_id).map(|t| (t.width, t.height, t.rgba8.clone()));
        let stride = template.vertex_layout.floats_per_vertex();
        let (_color_offset, uv_offset) = match template.vertex_layout {
            LayoutId::PositionColor => (2, None),
            LayoutId::PositionUvColor => (4, Some(2)),
        };
        let (tcx, tcy) = template.world_bounds.center();
        let vertex_count = template.vertices.len() / stride;
        let mut local = Vec::with_capacity(vertex_count);
        let mut uvs = Vec::with_capacity(vertex_count);
        for v in 0..vertex_count {
            let base = v * stride;
            local.push(Vec2::new(template.vertices[base] - tcx, template.vertices[base + 1] - tcy));
            if let Some(uo) = uv_offset {
                uvs.push([template.vertices[base + uo], template.vertices[base + uo + 1]]);
            }
        }

        for instance in instances {
            let (cx, cy, sx, sy) = (instance.transform[0], instance.transform[1], instance.transform[2], instance.transform[3]);
            let screen: Vec<Vec2> = local.iter().map(|p| viewport.world_to_screen(Vec2::new(cx + p.x * sx, cy + p.y * sy))).collect();
            let color = [instance.tint[0], instance.tint[1], instance.tint[2], instance.tint[3] * template.opacity];
            for tri in template.indices.chunks(3) {
                if tri.len() < 3 {
                    continue;
                }
                let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
                let tri_uvs = uv_offset.map(|_| [uvs[i0], uvs[i1], uvs[i2]]);
                self.rasterize_triangle([screen[i0], screen[i1], screen[i2]], [color, color, color], tri_uvs, texture.as_ref(), batch.key.blend_mode);
            }
        }
    }
}

/// Nearest-neighbor texel lookup; `u, v` are clamped into `[0, 1]` before
/// sampling, so over/undershoot from triangle interpolation never indexes
/// out of bounds.
fn sample_nearest(width: u32, height: u32, rgba8: &[u8], u: f32, v: f32) -> [f32; 4] {
    let tx = (u.clamp(0.0, 1.0) * (width.saturating_sub(1)) as f32).round() as u32;
    let ty = (v.clamp(0.0, 1.0) * (height.saturating_sub(1)) as f32).round() as u32;
    let offset = ((ty * width + tx) * 4) as usize;
    [
        rgba8[offset] as f32 / 255.0,
        rgba8[offset + 1] as f32 / 255.0,
        rgba8[offset + 2] as f32 / 255.0,
        rgba8[offset + 3] as f32 / 255.0,
    ]
}

fn edge(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x)
}

impl ShaderCompiler for SoftwareBackend {
    fn compile(&mut self, _source: &ShaderSource, _defines: &Defines) -> RenderResult<ShaderReflection> {
        // Nothing to compile: the rasterizer reads vertex colors directly.
        Ok(ShaderReflection::default())
    }
}

impl Backend for SoftwareBackend {
    fn clear(&mut self, color: Color) -> RenderResult<()> {
        let rgba = color.to_rgba8();
        for chunk in self.pixels.chunks_mut(4) {
            chunk.copy_from_slice(&rgba);
        }
        Ok(())
    }

    fn flush_batches(
        &mut self,
        batches: &[Batch],
        _shaders: &mut ShaderManager,
        _buffers: &mut BufferManager,
        viewport: &Viewport,
    ) -> RenderResult<()> {
        for batch in batches {
            self.draw_batch(batch, viewport);
        }
        Ok(())
    }

    fn present(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba8: &[u8]) -> RenderResult<TextureId> {
        if rgba8.len() != (width * height * 4) as usize {
            return Err(RenderError::InvalidConfig("texture byte length does not match dimensions".into()));
        }
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, Texture { width, height, rgba8: rgba8.to_vec() });
        Ok(id)
    }

    fn get_image_data(&self, x: u32, y: u32, width: u32, height: u32) -> RenderResult<Vec<u8>> {
        let mut out = Vec::with_capacity((width * height * 4) as usize);
        for row in y..y + height {
            for col in x..x + width {
                out.extend_from_slice(&self.pixel(col, row));
            }
        }
        Ok(out)
    }

    fn put_image_data(&mut self, x: u32, y: u32, width: u32, height: u32, rgba8: &[u8]) -> RenderResult<()> {
        if rgba8.len() != (width * height * 4) as usize {
            return Err(RenderError::InvalidConfig("image data length does not match dimensions".into()));
        }
        for row in 0..height {
            for col in 0..width {
                let src_offset = ((row * width + col) * 4) as usize;
                let offset = self.offset(x + col, y + row);
                self.pixels[offset..offset + 4].copy_from_slice(&rgba8[src_offset..src_offset + 4]);
            }
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.textures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::GeometryRecord;
    use crate::material::MaterialKey;
    use crate::math::Rect;

    fn quad_record(x: f32, y: f32, w: f32, h: f32, color: [f32; 4], z: i32) -> GeometryRecord {
        let mut vertices = Vec::new();
        for (vx, vy) in [(x, y), (x + w, y), (x + w, y + h), (x, y + h)] {
            vertices.extend_from_slice(&[vx, vy, color[0], color[1], color[2], color[3]]);
        }
        GeometryRecord {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
            material: MaterialKey::new(0, 0, BlendMode::Opaque, z),
            world_bounds: Rect::new(x, y, w, h),
            vertex_layout: LayoutId::PositionColor,
            z_index: z,
            opacity: 1.0,
        }
    }

    #[test]
    fn fills_rectangle_with_solid_color() {
        let mut backend = SoftwareBackend::new(800, 600);
        backend.clear(Color::TRANSPARENT).unwrap();
        let mut batch = Batch::new(MaterialKey::new(0, 0, BlendMode::Opaque, 0));
        batch.push(quad_record(100.0, 100.0, 200.0, 50.0, [1.0, 0.0, 0.0, 1.0], 0));
        let viewport = Viewport::new(0.0, 0.0, 800.0, 600.0);
        let mut shaders = ShaderManager::new();
        let mut buffers = BufferManager::new();
        backend.flush_batches(&[batch], &mut shaders, &mut buffers, &viewport).unwrap();

        assert_eq!(backend.pixel(150, 125), [255, 0, 0, 255]);
        assert_eq!(backend.pixel(50, 50), [0, 0, 0, 0]);
    }

    #[test]
    fn alpha_blend_mixes_with_background() {
        let mut backend = SoftwareBackend::new(10, 10);
        backend.clear(Color::WHITE).unwrap();
        let mut batch = Batch::new(MaterialKey::new(0, 0, BlendMode::Alpha, 0));
        batch.push(GeometryRecord { opacity: 0.5, ..quad_record(0.0, 0.0, 10.0, 10.0, [0.0, 0.0, 0.0, 1.0], 0) });
        let viewport = Viewport::new(0.0, 0.0, 10.0, 10.0);
        let mut shaders = ShaderManager::new();
        let mut buffers = BufferManager::new();
        backend.flush_batches(&[batch], &mut shaders, &mut buffers, &viewport).unwrap();
        let pixel = backend.pixel(5, 5);
        assert!(pixel[0] > 100 && pixel[0] < 150);
    }

    #[test]
    fn instanced_batch_draws_one_quad_per_instance_at_its_own_transform() {
        use crate::batch::InstanceData;

        let mut backend = SoftwareBackend::new(20, 20);
        backend.clear(Color::TRANSPARENT).unwrap();
        let mut batch = Batch::new(MaterialKey::new(0, 0, BlendMode::Opaque, 0));
        batch.push(quad_record(0.0, 0.0, 4.0, 4.0, [1.0, 1.0, 1.0, 1.0], 0));
        batch.instanced = true;
        batch.instances = Some(vec![
            InstanceData { transform: [2.0, 2.0, 1.0, 1.0], tint: [1.0, 0.0, 0.0, 1.0], uv_offset: [0.0, 0.0, 1.0, 1.0] },
            InstanceData { transform: [12.0, 12.0, 1.0, 1.0], tint: [0.0, 1.0, 0.0, 1.0], uv_offset: [0.0, 0.0, 1.0, 1.0] },
        ]);
        let viewport = Viewport::new(0.0, 0.0, 20.0, 20.0);
        let mut shaders = ShaderManager::new();
        let mut buffers = BufferManager::new();
        backend.flush_batches(&[batch], &mut shaders, &mut buffers, &viewport).unwrap();

        assert_eq!(backend.pixel(2, 2), [255, 0, 0, 255]);
        assert_eq!(backend.pixel(12, 12), [0, 255, 0, 255]);
        assert_eq!(backend.pixel(19, 19), [0, 0, 0, 0]);
    }

    #[test]
    fn put_and_get_image_data_round_trip() {
        let mut backend = SoftwareBackend::new(4, 4);
        let data = vec![10u8, 20, 30, 255, 40, 50, 60, 255, 70, 80, 90, 255, 100, 110, 120, 255];
        backend.put_image_data(0, 0, 2, 2, &data).unwrap();
        let read_back = backend.get_image_data(0, 0, 2, 2).unwrap();
        assert_eq!(read_back, data);
    }
}
