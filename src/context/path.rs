//! Path buffer construction and curve flattening.
//!
//! Curves are flattened to polylines with a fixed step count rather than an
//! adaptive (error-bound) tessellator — simpler, and deterministic enough
//! for the software backend's pixel-level test assertions.

use crate::math::Vec2;

const QUADRATIC_SEGMENTS: u32 = 20;
const CUBIC_SEGMENTS: u32 = 30;
const MIN_ARC_SEGMENTS: u32 = 16;
const ARC_SEGMENTS_PER_TAU: f32 = 32.0;

/// One flattened subpath: a polyline plus whether `close_path` was called
/// on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyline {
    pub points: Vec<Vec2>,
    pub closed: bool,
}

/// Accumulates path commands for the duration of one `begin_path` ..
/// `fill`/`stroke` cycle.
#[derive(Debug, Default)]
pub struct PathBuilder {
    subpaths: Vec<Polyline>,
    current: Option<Vec2>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_path(&mut self) {
        self.subpaths.clear();
        self.current = None;
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.subpaths.push(Polyline { points: vec![Vec2::new(x, y)], closed: false });
        self.current = Some(Vec2::new(x, y));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        let p = Vec2::new(x, y);
        self.push_point(p);
    }

    pub fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32) {
        let Some(p0) = self.current else { return };
        let cp = Vec2::new(cpx, cpy);
        let p1 = Vec2::new(x, y);
        for i in 1..=QUADRATIC_SEGMENTS {
            let t = i as f32 / QUADRATIC_SEGMENTS as f32;
            self.push_point(quadratic_point(p0, cp, p1, t));
        }
    }

    pub fn bezier_curve_to(&mut self, cp1x: f32, cp1y: f32, cp2x: f32, cp2y: f32, x: f32, y: f32) {
        let Some(p0) = self.current else { return };
        let cp1 = Vec2::new(cp1x, cp1y);
        let cp2 = Vec2::new(cp2x, cp2y);
        let p1 = Vec2::new(x, y);
        for i in 1..=CUBIC_SEGMENTS {
            let t = i as f32 / CUBIC_SEGMENTS as f32;
            self.push_point(cubic_point(p0, cp1, cp2, p1, t));
        }
    }

    /// Flattens an arc of `radius` around `(cx, cy)` from `start_angle` to
    /// `end_angle` (radians). Segment count scales with the swept angle:
    /// `max(16, ceil(|delta|*32/2pi))`.
    pub fn arc(&mut self, cx: f32, cy: f32, radius: f32, start_angle: f32, end_angle: f32) {
        let delta = end_angle - start_angle;
        let segments = arc_segment_count(delta);
        for i in 0..=segments {
            let t = i as f32 / segments as f32;
            let theta = start_angle + delta * t;
            let p = Vec2::new(cx + radius * theta.cos(), cy + radius * theta.sin());
            if i == 0 && self.current.is_none() {
                self.move_to(p.x, p.y);
            } else {
                self.push_point(p);
            }
        }
    }

    /// Opens and closes a four-point rectangular subpath.
    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.line_to(x + w, y);
        self.line_to(x + w, y + h);
        self.line_to(x, y + h);
        self.close_path();
    }

    pub fn close_path(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            sub.closed = true;
        }
    }

    pub fn subpaths(&self) -> &[Polyline] {
        &self.subpaths
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.points.len() < 2)
    }

    fn push_point(&mut self, p: Vec2) {
        match self.subpaths.last_mut() {
            Some(sub) => sub.points.push(p),
            None => self.subpaths.push(Polyline { points: vec![p], closed: false }),
        }
        self.current = Some(p);
    }
}

fn arc_segment_count(delta_angle: f32) -> u32 {
    let by_angle = (delta_angle.abs() * ARC_SEGMENTS_PER_TAU / std::f32::consts::TAU).ceil() as u32;
    by_angle.max(MIN_ARC_SEGMENTS)
}

fn quadratic_point(p0: Vec2, cp: Vec2, p1: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    p0 * (u * u) + cp * (2.0 * u * t) + p1 * (t * t)
}

fn cubic_point(p0: Vec2, cp1: Vec2, cp2: Vec2, p1: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    p0 * (u * u * u) + cp1 * (3.0 * u * u * t) + cp2 * (3.0 * u * t * t) + p1 * (t * t * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_curve_produces_fixed_segment_count() {
        let mut path = PathBuilder::new();
        path.move_to(0.0, 0.0);
        path.quadratic_curve_to(5.0, 10.0, 10.0, 0.0);
        assert_eq!(path.subpaths()[0].points.len() as u32, QUADRATIC_SEGMENTS + 1);
    }

    #[test]
    fn cubic_curve_produces_fixed_segment_count() {
        let mut path = PathBuilder::new();
        path.move_to(0.0, 0.0);
        path.bezier_curve_to(0.0, 10.0, 10.0, 10.0, 10.0, 0.0);
        assert_eq!(path.subpaths()[0].points.len() as u32, CUBIC_SEGMENTS + 1);
    }

    #[test]
    fn small_arc_uses_minimum_segment_count() {
        assert_eq!(arc_segment_count(0.01), MIN_ARC_SEGMENTS);
    }

    #[test]
    fn full_turn_arc_scales_with_angle() {
        assert_eq!(arc_segment_count(std::f32::consts::TAU), 32);
    }

    #[test]
    fn rect_opens_and_closes_four_points() {
        let mut path = PathBuilder::new();
        path.rect(0.0, 0.0, 10.0, 10.0);
        assert_eq!(path.subpaths().len(), 1);
        assert_eq!(path.subpaths()[0].points.len(), 4);
        assert!(path.subpaths()[0].closed);
    }

    #[test]
    fn begin_path_clears_previous_subpaths() {
        let mut path = PathBuilder::new();
        path.rect(0.0, 0.0, 10.0, 10.0);
        path.begin_path();
        assert!(path.subpaths().is_empty());
    }
}
