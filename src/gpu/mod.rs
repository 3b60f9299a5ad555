/*!
 * GPU resource managers: shader programs and pooled buffers.
 *
 * Both are owned exclusively by the engine and deliberately do not derive
 * `Send`/`Sync` — the single-threaded frame loop is the only caller.
 */

pub mod buffers;
pub mod shaders;

pub use buffers::{BufferHandle, BufferKind, BufferManager, BufferUsage};
pub use shaders::{Defines, ShaderCompiler, ShaderManager, ShaderProgram, ShaderReflection, ShaderSource};
