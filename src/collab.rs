/*!
 * External collaborators: injected at initialization, called only through
 * the [`crate::context::GraphicsContext`]. The core never implements text
 * shaping or image decoding itself.
 */

use crate::error::RenderResult;
use crate::material::TextureId;

/// Text style passed to the text collaborator; intentionally minimal —
/// shaping and font fallback are the collaborator's concern, not the
/// core's.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub size_px: f32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self { family: "sans-serif".to_string(), size_px: 16.0, bold: false, italic: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f32,
    pub height: f32,
}

/// Measures and rasterizes text. The core never shapes glyphs itself.
pub trait TextRasterizer {
    fn measure(&self, text: &str, style: &FontSpec) -> TextMetrics;
    fn rasterize(&mut self, text: &str, style: &FontSpec) -> RenderResult<TextureId>;
}

/// Loads image sources into backend textures. Async work (decode, upload)
/// must complete before `is_ready` returns true; the frame loop never
/// suspends waiting on a load.
pub trait ImageLoader {
    fn load(&mut self, source: &str) -> RenderResult<TextureId>;
    fn is_ready(&self, texture: TextureId) -> bool;
}

/// A `TextRasterizer` that reports zero-size metrics and refuses to
/// rasterize — suitable for headless contexts and unit tests that never
/// draw text.
#[derive(Debug, Default)]
pub struct NullTextRasterizer;

impl TextRasterizer for NullTextRasterizer {
    fn measure(&self, _text: &str, _style: &FontSpec) -> TextMetrics {
        TextMetrics { width: 0.0, height: 0.0 }
    }

    fn rasterize(&mut self, _text: &str, _style: &FontSpec) -> RenderResult<TextureId> {
        Err(crate::error::RenderError::InvalidConfig(
            "no TextRasterizer configured".to_string(),
        ))
    }
}

/// An `ImageLoader` that never produces a texture — suitable wherever the
/// scene under test draws no images.
#[derive(Debug, Default)]
pub struct NullImageLoader;

impl ImageLoader for NullImageLoader {
    fn load(&mut self, source: &str) -> RenderResult<TextureId> {
        Err(crate::error::RenderError::InvalidConfig(format!(
            "no ImageLoader configured, cannot load '{}'",
            source
        )))
    }

    fn is_ready(&self, _texture: TextureId) -> bool {
        false
    }
}
