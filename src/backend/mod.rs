/*!
 * Backend abstraction: the single seam between backend-agnostic pipeline
 * logic (state stack, tessellation, batching) and a concrete renderer.
 *
 * Three reference backends ship with the crate: [`software::SoftwareBackend`]
 * (a deterministic CPU rasterizer used by the test suite),
 * [`wgpu_backend::WgpuBackend`] (hardware-accelerated via `wgpu`), and
 * [`next_gen::NextGenBackend`] (a thin `WgpuBackend` variant that prefers the
 * browser/native WebGPU adapter path first). `GraphicsContext<B: Backend>`
 * is written once against the trait.
 */

pub mod next_gen;
pub mod software;
pub mod wgpu_backend;

pub use next_gen::NextGenBackend;
pub use software::SoftwareBackend;
pub use wgpu_backend::WgpuBackend;

use crate::batch::Batch;
use crate::color::Color;
use crate::error::RenderResult;
use crate::gpu::{BufferManager, ShaderCompiler, ShaderManager};
use crate::material::TextureId;
use crate::viewport::Viewport;

/// What a concrete renderer must provide underneath a `GraphicsContext`.
/// Implementers also implement [`ShaderCompiler`] to service
/// `ShaderManager::get_or_compile`.
pub trait Backend: ShaderCompiler {
    /// Clears the backbuffer to `color`; called once per `begin_frame`.
    fn clear(&mut self, color: Color) -> RenderResult<()>;

    /// Draws every batch, in the order given, through the backend's
    /// pipeline. `shaders`/`buffers` resolve the batches' material keys and
    /// vertex data to bound resources.
    fn flush_batches(
        &mut self,
        batches: &[Batch],
        shaders: &mut ShaderManager,
        buffers: &mut BufferManager,
        viewport: &Viewport,
    ) -> RenderResult<()>;

    /// Presents the backbuffer (swaps, in a windowed backend; a no-op for
    /// an offscreen one).
    fn present(&mut self) -> RenderResult<()>;

    /// Uploads raw RGBA8 pixels as a new texture, returning its id.
    fn create_texture(&mut self, width: u32, height: u32, rgba8: &[u8]) -> RenderResult<TextureId>;

    /// Reads back a region of the backbuffer as tightly-packed RGBA8.
    fn get_image_data(&self, x: u32, y: u32, width: u32, height: u32) -> RenderResult<Vec<u8>>;

    /// Writes RGBA8 pixels into the backbuffer at `(x, y)`.
    fn put_image_data(&mut self, x: u32, y: u32, width: u32, height: u32, rgba8: &[u8]) -> RenderResult<()>;

    fn dispose(&mut self);
}
