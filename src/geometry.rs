/*!
 * Tessellation of path primitives into triangle lists, in local (untransformed)
 * space. [`crate::context::GraphicsContext`] transforms and tags the result
 * before handing it to the batcher.
 */

use crate::math::Vec2;

/// A local-space triangle list: `indices.len()` is always a multiple of 3.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryData {
    pub vertices: Vec<Vec2>,
    pub indices: Vec<u16>,
}

impl GeometryData {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn triangle_fan(vertices: Vec<Vec2>) -> GeometryData {
        if vertices.len() < 3 {
            return GeometryData::default();
        }
        let mut indices = Vec::with_capacity((vertices.len() - 2) * 3);
        for i in 1..vertices.len() - 1 {
            indices.push(0u16);
            indices.push(i as u16);
            indices.push((i + 1) as u16);
        }
        GeometryData { vertices, indices }
    }
}

/// Builds local-space geometry for the primitive shapes the context's
/// fast-path methods (`fill_rect`, `fill_circle`, ...) and the path
/// tessellator (`fill`, `stroke`) both reduce to.
pub struct GeometryBuilder;

impl GeometryBuilder {
    /// An axis-aligned rectangle `(0,0)..(width,height)` as two triangles.
    /// Negative or zero dimensions clamp to zero, yielding empty geometry.
    pub fn rectangle(width: f32, height: f32) -> GeometryData {
        let w = width.max(0.0);
        let h = height.max(0.0);
        if w <= 0.0 || h <= 0.0 {
            return GeometryData::default();
        }
        let vertices = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(w, 0.0),
            Vec2::new(w, h),
            Vec2::new(0.0, h),
        ];
        GeometryData { vertices, indices: vec![0, 1, 2, 0, 2, 3] }
    }

    /// A regular polygon approximating a circle of radius `radius`,
    /// triangulated as a fan from the center. Non-positive radius or fewer
    /// than 3 segments yields empty geometry.
    pub fn circle(radius: f32, segments: u32) -> GeometryData {
        if radius <= 0.0 || segments < 3 {
            return GeometryData::default();
        }
        let mut vertices = Vec::with_capacity(segments as usize + 1);
        vertices.push(Vec2::new(0.0, 0.0));
        for i in 0..segments {
            let theta = (i as f32 / segments as f32) * std::f32::consts::TAU;
            vertices.push(Vec2::new(radius * theta.cos(), radius * theta.sin()));
        }
        let mut indices = Vec::with_capacity(segments as usize * 3);
        for i in 0..segments {
            let next = (i + 1) % segments;
            indices.push(0u16);
            indices.push((i + 1) as u16);
            indices.push((next + 1) as u16);
        }
        GeometryData { vertices, indices }
    }

    /// A ring of `segments` line quads, used by `stroke_circle`: each quad
    /// follows the same normal-offset construction as [`GeometryBuilder::line_quad`].
    pub fn circle_ring(radius: f32, segments: u32, line_width: f32) -> GeometryData {
        if radius <= 0.0 || segments < 3 || line_width <= 0.0 {
            return GeometryData::default();
        }
        let points: Vec<Vec2> = (0..=segments)
            .map(|i| {
                let theta = (i as f32 / segments as f32) * std::f32::consts::TAU;
                Vec2::new(radius * theta.cos(), radius * theta.sin())
            })
            .collect();
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for pair in points.windows(2) {
            let quad = GeometryBuilder::line_quad(pair[0], pair[1], line_width);
            if quad.is_empty() {
                continue;
            }
            let base = vertices.len() as u16;
            vertices.extend(quad.vertices);
            indices.extend(quad.indices.iter().map(|i| i + base));
        }
        GeometryData { vertices, indices }
    }

    /// A single straight-line segment's stroke quad: two triangles formed
    /// by offsetting `p1`/`p2` by `±width/2` along the segment's unit normal.
    /// A degenerate (near-zero-length) segment or non-positive width yields
    /// empty geometry.
    pub fn line_quad(p1: Vec2, p2: Vec2, width: f32) -> GeometryData {
        if width <= 0.0 {
            return GeometryData::default();
        }
        let normal = p1.normal_of_segment(&p2);
        if normal == Vec2::ZERO {
            return GeometryData::default();
        }
        let half = normal * (width * 0.5);
        let vertices = vec![p1 + half, p1 - half, p2 - half, p2 + half];
        GeometryData { vertices, indices: vec![0, 1, 2, 0, 2, 3] }
    }

    /// Fan-triangulates a polygon from its centroid. Exact for convex
    /// polygons; an accepted approximation for simple concave ones. Fewer
    /// than 3 points yields empty geometry.
    pub fn polygon_fan(points: &[Vec2]) -> GeometryData {
        if points.len() < 3 {
            return GeometryData::default();
        }
        let centroid = {
            let sum = points.iter().fold(Vec2::ZERO, |acc, p| acc + *p);
            sum * (1.0 / points.len() as f32)
        };
        let mut vertices = Vec::with_capacity(points.len() + 1);
        vertices.push(centroid);
        vertices.extend_from_slice(points);
        GeometryData::triangle_fan(vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_with_zero_dimension_is_empty() {
        assert!(GeometryBuilder::rectangle(0.0, 10.0).is_empty());
        assert!(GeometryBuilder::rectangle(-5.0, 10.0).is_empty());
    }

    #[test]
    fn rectangle_produces_two_triangles() {
        let geom = GeometryBuilder::rectangle(10.0, 20.0);
        assert_eq!(geom.vertices.len(), 4);
        assert_eq!(geom.indices.len(), 6);
    }

    #[test]
    fn circle_with_too_few_segments_is_empty() {
        assert!(GeometryBuilder::circle(10.0, 2).is_empty());
    }

    #[test]
    fn circle_fan_has_segments_triangles() {
        let geom = GeometryBuilder::circle(10.0, 32);
        assert_eq!(geom.indices.len(), 32 * 3);
        assert_eq!(geom.vertices.len(), 33);
    }

    #[test]
    fn degenerate_segment_yields_empty_line_quad() {
        let p = Vec2::new(5.0, 5.0);
        assert!(GeometryBuilder::line_quad(p, p, 2.0).is_empty());
    }

    #[test]
    fn zero_width_line_quad_is_empty() {
        let geom = GeometryBuilder::line_quad(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 0.0);
        assert!(geom.is_empty());
    }

    #[test]
    fn line_quad_has_four_vertices_two_triangles() {
        let geom = GeometryBuilder::line_quad(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 2.0);
        assert_eq!(geom.vertices.len(), 4);
        assert_eq!(geom.indices.len(), 6);
    }

    #[test]
    fn polygon_with_two_points_is_empty() {
        let points = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)];
        assert!(GeometryBuilder::polygon_fan(&points).is_empty());
    }

    #[test]
    fn triangle_polygon_fans_to_one_triangle() {
        let points = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(5.0, 10.0)];
        let geom = GeometryBuilder::polygon_fan(&points);
        assert_eq!(geom.indices.len(), 3);
        assert_eq!(geom.vertices.len(), 4);
    }

    #[test]
    fn circle_ring_produces_segment_quads() {
        let geom = GeometryBuilder::circle_ring(10.0, 16, 1.0);
        assert_eq!(geom.vertices.len(), 16 * 4);
        assert_eq!(geom.indices.len(), 16 * 6);
    }
}
