/*!
 * A framework-agnostic 2D rendering engine.
 *
 * Accepts a dynamic scene of [`Renderable`] objects and draws them each
 * frame through one of several interchangeable [`backend::Backend`]
 * implementations. The pipeline — layer sort, culling, state stack,
 * tessellation, batching — is backend-agnostic; only texture upload,
 * shader compilation, and the final draw calls are backend-specific.
 */

pub mod backend;
pub mod batch;
pub mod collab;
pub mod color;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod gpu;
pub mod layer;
pub mod material;
pub mod math;
pub mod queue;
pub mod renderable;
pub mod stats;
pub mod viewport;

pub use backend::{Backend, NextGenBackend, SoftwareBackend, WgpuBackend};
pub use color::Color;
pub use config::{BatchStrategy, EngineConfig};
pub use context::GraphicsContext;
pub use engine::RenderEngine;
pub use error::{RenderError, RenderResult};
pub use events::{EngineEvent, EventSink};
pub use layer::Layer;
pub use material::{BlendMode, MaterialKey, ShaderId, TextureId};
pub use renderable::Renderable;
pub use stats::FrameStats;
pub use viewport::Viewport;
