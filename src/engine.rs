/*!
 * Top-level coordinator: owns the layer set, viewport, backend, and the
 * per-frame pipeline (`GraphicsContext` -> `Batcher` -> `Backend`).
 */

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::backend::Backend;
use crate::batch::Batcher;
use crate::config::{BatchStrategy, EngineConfig};
use crate::context::GraphicsContext;
use crate::error::{RenderError, RenderResult};
use crate::events::{EngineEvent, EventSink};
use crate::gpu::{BufferManager, ShaderManager};
use crate::layer::Layer;
use crate::math::Rect;
use crate::queue::RenderQueue;
use crate::renderable::Renderable;
use crate::stats::{select_strategy, FrameStats, MemoryBudget, StatsWindow};
use crate::viewport::Viewport;

/// Drives the frame loop against a concrete [`Backend`]. Generic over the
/// backend so the pipeline logic — layer sort, culling, batching, flush
/// ordering — is written once and shared by `SoftwareBackend`,
/// `WgpuBackend`, and `NextGenBackend` alike.
pub struct RenderEngine<B: Backend> {
    backend: B,
    shaders: ShaderManager,
    buffers: BufferManager,
    ctx: GraphicsContext,
    layers: HashMap<String, Layer>,
    viewport: Viewport,
    config: EngineConfig,
    stats: FrameStats,
    stats_window: StatsWindow,
    events: EventSink,
    running: bool,
    disposed: bool,
    last_frame_at: Option<Instant>,
}

impl<B: Backend> RenderEngine<B> {
    /// Builds the engine around an already-acquired `backend`. Backend
    /// acquisition is the pipeline's one asynchronous suspension point
    /// (e.g. `WgpuBackend::new` requesting a device); by the time a
    /// `backend` value exists, everything from here on is synchronous.
    /// Precompiles the built-in shader library, failing with
    /// `InitializationFailed` on a compile/link error.
    pub fn initialize(mut backend: B, viewport: Viewport, config: EngineConfig) -> RenderResult<Self> {
        config.validate()?;
        let mut shaders = ShaderManager::new();
        shaders
            .install_builtin_quad_shader(&mut backend)
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;

        log::info!("render engine initialized: target_fps={}, strategy={:?}", config.target_fps, config.batch_strategy);

        let batcher = Batcher::new(config.batch_strategy).with_max_batch_vertices(config.max_batch_vertices as usize);
        let ctx = GraphicsContext::new(batcher).with_max_stack_depth(config.max_state_stack_depth);

        Ok(Self {
            backend,
            shaders,
            buffers: BufferManager::new(),
            ctx,
            layers: HashMap::new(),
            viewport,
            config,
            stats: FrameStats::default(),
            stats_window: StatsWindow::default(),
            events: EventSink::new(),
            running: false,
            disposed: false,
            last_frame_at: None,
        })
    }

    pub fn add_layer(&mut self, name: impl Into<String>, z: i32) -> RenderResult<()> {
        let name = name.into();
        if self.layers.contains_key(&name) {
            return Err(RenderError::DuplicateId(name));
        }
        self.layers.insert(name.clone(), Layer::new(name, z));
        self.events.emit(EngineEvent::GraphicsChanged);
        Ok(())
    }

    pub fn remove_layer(&mut self, name: &str) -> bool {
        let removed = self.layers.remove(name).is_some();
        if removed {
            self.events.emit(EngineEvent::GraphicsChanged);
        }
        removed
    }

    pub fn get_layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    pub fn get_layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.get_mut(name)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.events.emit(EngineEvent::GraphicsChanged);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn subscribe(&mut self, callback: Box<dyn FnMut(&EngineEvent)>) {
        self.events.subscribe(callback);
    }

    pub fn start(&mut self) {
        self.running = true;
        self.last_frame_at = None;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advances the internal clock-based pump: renders a frame if enough
    /// time has elapsed since the last one (or unconditionally once, the
    /// first time this is called after `start`). Returns whether a frame
    /// was rendered. A no-op if `stop()` has been called or the engine is
    /// disposed.
    pub fn tick(&mut self, now: Instant) -> RenderResult<bool> {
        if !self.running || self.disposed {
            return Ok(false);
        }
        if self.config.vsync {
            self.last_frame_at = Some(now);
            self.render()?;
            return Ok(true);
        }
        if self.config.target_fps == 0 {
            self.last_frame_at = Some(now);
            self.render()?;
            return Ok(true);
        }
        let interval = Duration::from_secs_f64(1.0 / self.config.target_fps as f64);
        let due = match self.last_frame_at {
            Some(last) => now.saturating_duration_since(last) >= interval,
            None => true,
        };
        if !due {
            return Ok(false);
        }
        self.last_frame_at = Some(now);
        self.render()?;
        Ok(true)
    }

    /// Renders exactly one frame: clear, sort, cull, draw, flush. Calling
    /// this directly (outside `tick`) is always valid and is how the test
    /// suite drives deterministic frames.
    pub fn render(&mut self) -> RenderResult<()> {
        if self.disposed {
            return Err(RenderError::Disposed);
        }

        self.begin_frame()?;

        let mut layer_names: Vec<&String> = self.layers.keys().collect();
        layer_names.sort_by_key(|name| self.layers[*name].z());

        let world_rect = Rect::new(self.viewport.x, self.viewport.y, self.viewport.width, self.viewport.height);

        for name in layer_names {
            let layer = &self.layers[name];
            for renderable in layer.iter_sorted() {
                if self.config.enable_culling && !renderable.bounds().intersects(&world_rect) {
                    self.stats.culled += 1;
                    continue;
                }
                self.ctx.reset();
                self.ctx.set_current_z_index(renderable.z_index());
                let depth_before = self.ctx.stack_depth();
                renderable.render(&mut self.ctx);
                if self.ctx.stack_depth() != depth_before {
                    log::warn!("renderable '{}' left an unbalanced save/restore stack; forcing reset", renderable.id());
                    self.ctx.reset();
                }
            }
        }

        self.end_frame()
    }

    fn begin_frame(&mut self) -> RenderResult<()> {
        self.stats = FrameStats::default();
        self.backend.clear(self.config.clear_color.into())?;
        Ok(())
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        let batches = self.ctx.batcher_mut().flush();
        let dropped = self.ctx.batcher_mut().take_dropped_records();
        let queue = RenderQueue::new(batches);

        self.stats.batches = queue.len() as u32;
        self.stats.draw_calls = queue.len() as u32;
        for batch in queue.iter() {
            self.stats.vertices += batch.vertex_count() as u32;
            self.stats.triangles += (batch.index_count() / 3) as u32;
            if batch.instanced {
                self.stats.instanced_count += batch.instance_count() as u32;
            }
        }
        self.stats.dropped_records = dropped;
        if dropped > 0 {
            log::warn!("dropped {} geometry record(s) this frame", dropped);
        }

        let flush_result = self.backend.flush_batches(queue.as_slice(), &mut self.shaders, &mut self.buffers, &self.viewport);
        if let Err(e) = &flush_result {
            self.events.emit(EngineEvent::RenderError { kind: "flush".to_string(), message: e.to_string() });
            if e.is_fatal() {
                return flush_result;
            }
        }
        self.backend.present()?;

        self.stats_window.push(self.stats);
        if self.config.enable_auto_optimization && self.config.batch_strategy == BatchStrategy::Auto {
            let strategy = select_strategy(&self.stats_window, MemoryBudget::default());
            self.ctx.batcher_mut().set_strategy(strategy);
        }

        self.events.emit(EngineEvent::RenderCompleted(self.stats));
        Ok(())
    }

    pub fn get_stats(&self) -> FrameStats {
        self.stats
    }

    /// Uploads raw RGBA8 pixels to the backend and returns the resulting
    /// texture id. A convenience passthrough for an `ImageLoader`
    /// implementation that needs the live backend to complete a load.
    pub fn create_texture(&mut self, width: u32, height: u32, rgba8: &[u8]) -> RenderResult<crate::material::TextureId> {
        self.backend.create_texture(width, height, rgba8)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Escape hatch for an embedder that needs to inject a collaborator
    /// (image loader, text rasterizer, color parser) after construction.
    pub fn context_mut(&mut self) -> &mut GraphicsContext {
        &mut self.ctx
    }

    /// Direct backend access, for `get_image_data`/`put_image_data` and
    /// other operations `GraphicsContext` declines to proxy (see its own
    /// `get_image_data`).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Tears down in reverse construction order. Idempotent: a second call
    /// is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for layer in self.layers.values_mut() {
            layer.clear();
        }
        self.layers.clear();
        self.buffers.dispose();
        self.shaders.dispose();
        self.ctx.dispose();
        self.backend.dispose();
        self.disposed = true;
        log::info!("render engine disposed");
    }
}
