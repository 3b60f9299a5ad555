/*!
 * The capability set the engine consumes every frame.
 */

use crate::context::GraphicsContext;
use crate::math::Rect;

/// Anything the engine can place in a [`crate::layer::Layer`] and draw.
///
/// A `Renderable` is consumed, not owned, by the core: the engine holds a
/// `Box<dyn Renderable>` and calls into it once per visible frame. `render`
/// must be side-effect-only with respect to the engine — it may call
/// `ctx` methods but must not retain `ctx` past the call or mutate engine
/// state directly.
pub trait Renderable {
    /// Stable identifier, unique within the owning engine.
    fn id(&self) -> &str;

    /// Axis-aligned world-space bounds, used for culling and spatial
    /// clustering during batch optimization.
    fn bounds(&self) -> Rect;

    /// Invisible renderables are skipped before `render` is ever called.
    fn visible(&self) -> bool {
        true
    }

    /// Draw order within a layer; ties are broken by insertion order.
    fn z_index(&self) -> i32 {
        0
    }

    /// Emits draw primitives through `ctx`. Must not suspend, perform I/O,
    /// or retain `ctx` beyond this call.
    fn render(&self, ctx: &mut GraphicsContext);

    /// Point-in-shape test in world space, for picking. Defaults to a
    /// bounds-rectangle containment check.
    fn hit_test(&self, x: f32, y: f32) -> bool {
        self.bounds().contains_point(x, y)
    }

    /// Called once when the renderable is removed from its layer or the
    /// engine is disposed. Default is a no-op.
    fn dispose(&mut self) {}
}
