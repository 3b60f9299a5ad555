/*!
 * The batching discriminator: two geometry records may share a draw call
 * iff their `MaterialKey`s are equal.
 */

/// Blend function applied when compositing a batch's fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlendMode {
    Opaque,
    Alpha,
    Additive,
}

impl Default for BlendMode {
    fn default() -> Self {
        BlendMode::Alpha
    }
}

/// Opaque identifier for a texture owned by a backend. `0` is reserved for
/// "no texture" (solid fills).
pub type TextureId = u32;

/// Opaque identifier for a compiled `ShaderProgram` owned by the
/// `ShaderManager`.
pub type ShaderId = u32;

/// `(texture_id, shader_id, blend_mode, z_band)`. Two `GeometryRecord`s
/// batch together iff their keys compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub texture_id: TextureId,
    pub shader_id: ShaderId,
    pub blend_mode: BlendMode,
    pub z_band: i32,
}

impl MaterialKey {
    pub fn new(texture_id: TextureId, shader_id: ShaderId, blend_mode: BlendMode, z_index: i32) -> Self {
        Self { texture_id, shader_id, blend_mode, z_band: z_band(z_index) }
    }

    /// Same texture/shader/blend as `other`, ignoring z-band — the
    /// condition under which two batches from adjacent bands are eligible
    /// for a merge.
    pub fn same_material_family(&self, other: &MaterialKey) -> bool {
        self.texture_id == other.texture_id
            && self.shader_id == other.shader_id
            && self.blend_mode == other.blend_mode
    }
}

/// Buckets a z-index into a band of 10. `z_band(23) == 2`, `z_band(-5) == -1`
/// (floor division, not truncation, so negative indices band consistently).
pub fn z_band(z_index: i32) -> i32 {
    z_index.div_euclid(10)
}
