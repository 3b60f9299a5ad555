/*!
 * Screen/world mapping and the frame projection matrix.
 */

use crate::math::{Mat3, Vec2};

/// A camera over the world, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub zoom: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height, zoom: 1.0 }
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom.max(1e-6);
        self
    }

    /// World-to-clip-space projection: centers the viewport, applies zoom,
    /// then scales to the `[-1, 1]` NDC cube with Y flipped (screen-space Y
    /// grows downward, clip-space Y grows upward).
    pub fn projection_matrix(&self) -> Mat3 {
        let center = Mat3::from_translation(-(self.x + self.width * 0.5), -(self.y + self.height * 0.5));
        let half_w = (self.width * 0.5).max(1e-6);
        let half_h = (self.height * 0.5).max(1e-6);
        let scale = Mat3::from_scale(self.zoom / half_w, -self.zoom / half_h);
        center.then(&scale)
    }

    /// Converts a screen-space pixel coordinate (origin top-left) to world
    /// space.
    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        let nx = screen.x / self.width - 0.5;
        let ny = screen.y / self.height - 0.5;
        Vec2::new(
            self.x + self.width * 0.5 + nx * self.width / self.zoom,
            self.y + self.height * 0.5 + ny * self.height / self.zoom,
        )
    }

    /// Inverse of [`Viewport::screen_to_world`].
    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        let nx = (world.x - self.x - self.width * 0.5) * self.zoom / self.width;
        let ny = (world.y - self.y - self.height * 0.5) * self.zoom / self.height;
        Vec2::new((nx + 0.5) * self.width, (ny + 0.5) * self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_to_world_round_trips_through_world_to_screen() {
        let viewport = Viewport::new(0.0, 0.0, 800.0, 600.0).with_zoom(2.0);
        let world = Vec2::new(123.0, 45.0);
        let screen = viewport.world_to_screen(world);
        let round_tripped = viewport.screen_to_world(screen);
        assert!((round_tripped.x - world.x).abs() < 1e-3);
        assert!((round_tripped.y - world.y).abs() < 1e-3);
    }

    #[test]
    fn center_of_viewport_maps_to_screen_center() {
        let viewport = Viewport::new(100.0, 100.0, 800.0, 600.0);
        let screen = viewport.world_to_screen(Vec2::new(500.0, 400.0));
        assert!((screen.x - 400.0).abs() < 1e-3);
        assert!((screen.y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped_away_from_zero() {
        let viewport = Viewport::new(0.0, 0.0, 100.0, 100.0).with_zoom(0.0);
        assert!(viewport.zoom > 0.0);
    }
}
