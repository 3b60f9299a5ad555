/*!
 * Error taxonomy for the render pipeline.
 *
 * Hand-rolled, in the spirit of the engines this crate descends from: a flat
 * enum with a manual `Display`, rather than a `thiserror` derive. Every
 * fallible operation in the crate returns `RenderResult<T>`.
 */

use std::fmt;

/// Result type alias used throughout the crate.
pub type RenderResult<T> = Result<T, RenderError>;

/// The shader compilation stage a [`RenderError::ShaderCompileFailed`] failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Errors produced by the render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    // === INITIALIZATION ===
    /// The requested backend is not supported on the given surface.
    BackendUnavailable(String),
    /// Startup shader compile/link failure while building the built-in
    /// shader library.
    InitializationFailed(String),

    // === SHADERS ===
    ShaderCompileFailed { stage: ShaderStage, log: String },
    ShaderLinkFailed { log: String },

    // === GPU RESOURCES ===
    OutOfGpuMemory,
    BufferError(String),

    // === STATE MACHINE ===
    StateStackOverflow { depth: usize, limit: usize },
    StateStackUnderflow,
    Disposed,

    // === LAYERS ===
    DuplicateId(String),
    LayerNotFound(String),

    // === GEOMETRY ===
    /// Non-fatal: the offending primitive is skipped and a warning is
    /// surfaced through `FrameStats`, not propagated to the caller.
    InvalidGeometry(String),

    // === CONFIGURATION ===
    InvalidConfig(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::BackendUnavailable(reason) => {
                write!(f, "backend unavailable: {}", reason)
            }
            RenderError::InitializationFailed(reason) => {
                write!(f, "engine initialization failed: {}", reason)
            }
            RenderError::ShaderCompileFailed { stage, log } => {
                write!(f, "{} shader compile failed: {}", stage, log)
            }
            RenderError::ShaderLinkFailed { log } => {
                write!(f, "shader link failed: {}", log)
            }
            RenderError::OutOfGpuMemory => write!(f, "out of GPU memory"),
            RenderError::BufferError(reason) => write!(f, "buffer error: {}", reason),
            RenderError::StateStackOverflow { depth, limit } => {
                write!(f, "state stack overflow: depth {} exceeds limit {}", depth, limit)
            }
            RenderError::StateStackUnderflow => write!(f, "state stack underflow: restore() without matching save()"),
            RenderError::Disposed => write!(f, "operation attempted on a disposed resource"),
            RenderError::DuplicateId(id) => write!(f, "duplicate renderable id: '{}'", id),
            RenderError::LayerNotFound(name) => write!(f, "layer not found: '{}'", name),
            RenderError::InvalidGeometry(reason) => write!(f, "invalid geometry: {}", reason),
            RenderError::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for RenderError {}

impl RenderError {
    /// True for errors that abort the in-flight frame rather than being
    /// recorded per-record and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::OutOfGpuMemory
                | RenderError::Disposed
                | RenderError::StateStackUnderflow
                | RenderError::StateStackOverflow { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_classified_correctly() {
        assert!(RenderError::OutOfGpuMemory.is_fatal());
        assert!(RenderError::Disposed.is_fatal());
        assert!(!RenderError::InvalidGeometry("too few points".into()).is_fatal());
    }

    #[test]
    fn display_includes_context() {
        let err = RenderError::DuplicateId("player".to_string());
        assert!(err.to_string().contains("player"));
    }
}
