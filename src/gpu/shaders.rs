/*!
 * Shader source registration, compilation caching, and uniform reflection.
 *
 * Compilation itself is backend work (a `SoftwareBackend` has nothing to
 * compile; a `WgpuBackend` builds a real pipeline); `ShaderManager` owns the
 * source templates and the cache keyed by `(name, defines)`, delegating the
 * actual compile+link step to whatever [`ShaderCompiler`] the active
 * backend provides.
 */

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::error::{RenderError, RenderResult};
use crate::material::ShaderId;

pub type Defines = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub name: String,
    pub vertex_src: String,
    pub fragment_src: String,
    pub default_defines: Defines,
}

/// Reflection info a compiled program exposes for uniform type-checking.
#[derive(Debug, Clone, Default)]
pub struct ShaderReflection {
    pub attrib_locations: HashMap<String, i32>,
    pub uniform_locations: HashMap<String, i32>,
}

/// A cached, compiled program.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub id: ShaderId,
    pub name: String,
    pub defines: Defines,
    pub reflection: ShaderReflection,
}

/// Backend hook for the actual compile+link step. `SoftwareBackend`
/// implements this as a no-op that always succeeds (there is nothing to
/// compile for a CPU rasterizer); `WgpuBackend` builds a real
/// `wgpu::RenderPipeline`.
pub trait ShaderCompiler {
    fn compile(&mut self, source: &ShaderSource, defines: &Defines) -> RenderResult<ShaderReflection>;
}

/// Compiles, links, and caches shader programs keyed by `(name, defines)`.
pub struct ShaderManager {
    sources: HashMap<String, ShaderSource>,
    cache: HashMap<(String, Defines), ShaderProgram>,
    bound: Option<ShaderId>,
    next_id: ShaderId,
}

impl ShaderManager {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            cache: HashMap::new(),
            bound: None,
            next_id: 1,
        }
    }

    /// Parses and stores a source template; does not compile anything yet.
    pub fn register(&mut self, source: ShaderSource) {
        self.sources.insert(source.name.clone(), source);
    }

    /// Returns a cached program, compiling on miss via `compiler`.
    pub fn get_or_compile(&mut self, name: &str, defines: &Defines, compiler: &mut dyn ShaderCompiler) -> RenderResult<ShaderId> {
        let cache_key = (name.to_string(), defines.clone());
        if let Some(program) = self.cache.get(&cache_key) {
            return Ok(program.id);
        }

        let source = self
            .sources
            .get(name)
            .ok_or_else(|| RenderError::InitializationFailed(format!("unregistered shader '{}'", name)))?
            .clone();

        let reflection = compiler.compile(&source, defines)?;

        let id = self.next_id;
        self.next_id += 1;
        self.cache.insert(
            cache_key,
            ShaderProgram { id, name: name.to_string(), defines: defines.clone(), reflection },
        );
        Ok(id)
    }

    /// Sets the active program; a no-op if it's already bound.
    pub fn bind(&mut self, id: ShaderId) {
        if self.bound != Some(id) {
            self.bound = Some(id);
        }
    }

    pub fn bound(&self) -> Option<ShaderId> {
        self.bound
    }

    pub fn program(&self, id: ShaderId) -> Option<&ShaderProgram> {
        self.cache.values().find(|p| p.id == id)
    }

    pub fn dispose(&mut self) {
        self.cache.clear();
        self.sources.clear();
        self.bound = None;
    }

    /// Registers the single built-in `"quad"` program and precompiles every
    /// `TEXTURED` x `INSTANCED` define combination so the first real frame
    /// never pays a compile-on-miss cost, regardless of which batching
    /// strategy picks it.
    pub fn install_builtin_quad_shader(&mut self, compiler: &mut dyn ShaderCompiler) -> RenderResult<()> {
        self.register(ShaderSource {
            name: "quad".to_string(),
            vertex_src: BUILTIN_QUAD_VERTEX_SRC.to_string(),
            fragment_src: BUILTIN_QUAD_FRAGMENT_SRC.to_string(),
            default_defines: Defines::new(),
        });
        for textured in ["0", "1"] {
            for instanced in ["0", "1"] {
                let mut defines = Defines::new();
                defines.insert("TEXTURED".to_string(), textured.to_string());
                defines.insert("INSTANCED".to_string(), instanced.to_string());
                self.get_or_compile("quad", &defines, compiler)?;
            }
        }
        Ok(())
    }
}

impl Default for ShaderManager {
    fn default() -> Self {
        Self::new()
    }
}

const BUILTIN_QUAD_VERTEX_SRC: &str = include_str!("../../shaders/quad.vert.wgsl");
const BUILTIN_QUAD_FRAGMENT_SRC: &str = include_str!("../../shaders/quad.frag.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    struct StubCompiler {
        calls: u32,
        fail: bool,
    }

    impl ShaderCompiler for StubCompiler {
        fn compile(&mut self, _source: &ShaderSource, _defines: &Defines) -> RenderResult<ShaderReflection> {
            self.calls += 1;
            if self.fail {
                return Err(RenderError::ShaderCompileFailed {
                    stage: crate::error::ShaderStage::Fragment,
                    log: "stub failure".into(),
                });
            }
            Ok(ShaderReflection::default())
        }
    }

    fn quad_source() -> ShaderSource {
        ShaderSource {
            name: "quad".into(),
            vertex_src: "vs".into(),
            fragment_src: "fs".into(),
            default_defines: Defines::new(),
        }
    }

    #[test]
    fn compiling_twice_with_same_defines_hits_cache() {
        let mut manager = ShaderManager::new();
        manager.register(quad_source());
        let mut compiler = StubCompiler { calls: 0, fail: false };
        let defines = Defines::new();
        manager.get_or_compile("quad", &defines, &mut compiler).unwrap();
        manager.get_or_compile("quad", &defines, &mut compiler).unwrap();
        assert_eq!(compiler.calls, 1);
    }

    #[test]
    fn different_defines_compile_separately() {
        let mut manager = ShaderManager::new();
        manager.register(quad_source());
        let mut compiler = StubCompiler { calls: 0, fail: false };
        let mut textured = Defines::new();
        textured.insert("TEXTURED".into(), "1".into());
        manager.get_or_compile("quad", &Defines::new(), &mut compiler).unwrap();
        manager.get_or_compile("quad", &textured, &mut compiler).unwrap();
        assert_eq!(compiler.calls, 2);
    }

    #[test]
    fn unregistered_shader_fails() {
        let mut manager = ShaderManager::new();
        let mut compiler = StubCompiler { calls: 0, fail: false };
        assert!(manager.get_or_compile("missing", &Defines::new(), &mut compiler).is_err());
    }

    #[test]
    fn compile_failure_propagates() {
        let mut manager = ShaderManager::new();
        manager.register(quad_source());
        let mut compiler = StubCompiler { calls: 0, fail: true };
        let err = manager.get_or_compile("quad", &Defines::new(), &mut compiler).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompileFailed { .. }));
    }

    #[test]
    fn bind_is_idempotent() {
        let mut manager = ShaderManager::new();
        manager.bind(1);
        manager.bind(1);
        assert_eq!(manager.bound(), Some(1));
    }
}
