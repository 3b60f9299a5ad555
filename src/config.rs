/*!
 * Engine configuration.
 *
 * `EngineConfig` is a plain serde record, loadable from TOML, with
 * `#[serde(deny_unknown_fields)]` so a typo in a config file fails loudly at
 * construction time rather than being silently ignored.
 */

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Which batching strategy the batcher should use for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStrategy {
    /// One batch per material key, in flush order. No merging, no instancing.
    Basic,
    /// Adjacent same-material batches are merged and spatially clustered.
    Enhanced,
    /// Identical geometry with different transforms is drawn instanced.
    Instanced,
    /// Picks Basic/Enhanced/Instanced per-frame from recent `FrameStats`.
    Auto,
}

impl Default for BatchStrategy {
    fn default() -> Self {
        BatchStrategy::Auto
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    #[serde(default)]
    pub batch_strategy: BatchStrategy,

    /// Hard cap on vertices per batch before a split is forced.
    #[serde(default = "default_max_batch_vertices")]
    pub max_batch_vertices: u32,

    /// Hard cap on the save/restore depth of a `GraphicsContext`.
    #[serde(default = "default_max_state_stack_depth")]
    pub max_state_stack_depth: usize,

    #[serde(default)]
    pub vsync: bool,

    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],

    /// Skip renderables whose bounds miss the viewport before `render` is
    /// ever called.
    #[serde(default = "default_true")]
    pub enable_culling: bool,

    /// Minimum same-material records before a batch is flagged `instanced`
    /// under the `Instanced`/`Auto` strategies.
    #[serde(default = "default_instancing_threshold")]
    pub instancing_threshold: usize,

    /// Max world-unit distance between record centers for spatial
    /// clustering under `Enhanced`/`Instanced`/`Auto`.
    #[serde(default = "default_spatial_threshold")]
    pub spatial_threshold: f32,

    /// Warning threshold for texture rebinds in a single frame; surfaced
    /// through `FrameStats`, never enforced as a hard cap.
    #[serde(default = "default_max_texture_binds_per_frame")]
    pub max_texture_binds_per_frame: u32,

    /// Enables the `StatsWindow`-driven adaptive selector when
    /// `batch_strategy` is `Auto`.
    #[serde(default = "default_true")]
    pub enable_auto_optimization: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            batch_strategy: BatchStrategy::default(),
            max_batch_vertices: default_max_batch_vertices(),
            max_state_stack_depth: default_max_state_stack_depth(),
            vsync: false,
            clear_color: default_clear_color(),
            enable_culling: true,
            instancing_threshold: default_instancing_threshold(),
            spatial_threshold: default_spatial_threshold(),
            max_texture_binds_per_frame: default_max_texture_binds_per_frame(),
            enable_auto_optimization: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_instancing_threshold() -> usize {
    50
}

fn default_spatial_threshold() -> f32 {
    100.0
}

fn default_max_texture_binds_per_frame() -> u32 {
    16
}

fn default_target_fps() -> u32 {
    60
}

fn default_max_batch_vertices() -> u32 {
    10_000
}

fn default_max_state_stack_depth() -> usize {
    64
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl EngineConfig {
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    pub fn with_batch_strategy(mut self, strategy: BatchStrategy) -> Self {
        self.batch_strategy = strategy;
        self
    }

    pub fn with_max_batch_vertices(mut self, max: u32) -> Self {
        self.max_batch_vertices = max;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_enable_culling(mut self, enable: bool) -> Self {
        self.enable_culling = enable;
        self
    }

    pub fn with_instancing_threshold(mut self, threshold: usize) -> Self {
        self.instancing_threshold = threshold;
        self
    }

    pub fn with_spatial_threshold(mut self, threshold: f32) -> Self {
        self.spatial_threshold = threshold;
        self
    }

    /// Parses a TOML document into a config. Unrecognized keys and
    /// out-of-range values are construction errors, not warnings.
    pub fn from_toml_str(text: &str) -> RenderResult<Self> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| RenderError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.target_fps == 0 {
            return Err(RenderError::InvalidConfig("target_fps must be non-zero".into()));
        }
        if self.max_batch_vertices == 0 {
            return Err(RenderError::InvalidConfig(
                "max_batch_vertices must be non-zero".into(),
            ));
        }
        if self.max_batch_vertices > 65536 {
            return Err(RenderError::InvalidConfig(
                "max_batch_vertices cannot exceed the 16-bit index cap of 65536".into(),
            ));
        }
        if self.max_state_stack_depth == 0 {
            return Err(RenderError::InvalidConfig(
                "max_state_stack_depth must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let toml = "target_fps = 30\nbogus_field = 1\n";
        assert!(EngineConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn zero_fps_is_rejected() {
        let toml = "target_fps = 0\n";
        assert!(EngineConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn over_cap_batch_vertices_rejected() {
        let config = EngineConfig::default().with_max_batch_vertices(100_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn culling_defaults_to_enabled() {
        assert!(EngineConfig::default().enable_culling);
    }

    #[test]
    fn builder_methods_chain() {
        let config = EngineConfig::default()
            .with_target_fps(30)
            .with_vsync(true)
            .with_batch_strategy(BatchStrategy::Basic);
        assert_eq!(config.target_fps, 30);
        assert!(config.vsync);
        assert_eq!(config.batch_strategy, BatchStrategy::Basic);
    }
}
