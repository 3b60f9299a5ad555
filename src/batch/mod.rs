/*!
 * Batch aggregation: groups per-frame geometry records by material so the
 * backend issues a small number of draw calls instead of one per renderable.
 */

mod batcher;
mod instancing;
mod optimize;

pub use batcher::Batcher;

use crate::material::MaterialKey;
use crate::math::Rect;

pub use instancing::InstanceData;

/// A single piece of pre-transformed geometry emitted by the context.
/// Vertices are already in world space, so a record is self-contained and
/// safe to move between batches during optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRecord {
    pub vertices: Vec<f32>,
    pub indices: Vec<u16>,
    pub material: MaterialKey,
    pub world_bounds: Rect,
    pub vertex_layout: LayoutId,
    pub z_index: i32,
    pub opacity: f32,
}

impl GeometryRecord {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.vertex_layout.floats_per_vertex()
    }
}

/// Identifies the vertex attribute layout a record's float buffer follows,
/// so the batcher can merge records only when layouts match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutId {
    /// `position.xy, color.rgba` — solid fills and strokes.
    PositionColor,
    /// `position.xy, uv.xy, color.rgba` — textured quads.
    PositionUvColor,
}

impl LayoutId {
    pub fn floats_per_vertex(self) -> usize {
        match self {
            LayoutId::PositionColor => 6,
            LayoutId::PositionUvColor => 8,
        }
    }
}

/// A group of records sharing a `MaterialKey`, ready to flush as one or a
/// few draw calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub key: MaterialKey,
    pub records: Vec<GeometryRecord>,
    pub instanced: bool,
    /// Per-instance transform/tint/uv-offset data, populated only when
    /// `instanced` is set. The backend issues one instanced draw over this
    /// buffer instead of one draw per record.
    pub instances: Option<Vec<InstanceData>>,
    pub priority: f32,
    pub estimated_cost: f32,
    pub spatial_bounds: Rect,
    /// Set once a batch has been split on overflow; such a batch is never
    /// merged back into another during optimization.
    pub can_merge: bool,
}

impl Batch {
    pub fn new(key: MaterialKey) -> Self {
        Self {
            key,
            records: Vec::new(),
            instanced: false,
            instances: None,
            priority: 0.0,
            estimated_cost: 0.0,
            spatial_bounds: Rect::empty(),
            can_merge: true,
        }
    }

    /// Number of draw instances this batch represents: the instance count
    /// when `instanced`, one otherwise (a single non-instanced draw covers
    /// every record in one indexed draw call).
    pub fn instance_count(&self) -> usize {
        self.instances.as_ref().map_or(1, |instances| instances.len())
    }

    pub fn vertex_count(&self) -> usize {
        self.records.iter().map(|r| r.vertex_count()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.records.iter().map(|r| r.indices.len()).sum()
    }

    pub fn push(&mut self, record: GeometryRecord) {
        self.spatial_bounds = if self.records.is_empty() {
            record.world_bounds
        } else {
            self.spatial_bounds.union(&record.world_bounds)
        };
        self.records.push(record);
    }

    /// True if any record in this batch is semi-transparent. Cross-z-band
    /// merges are refused whenever either side of the merge has this set,
    /// since merging would reorder the alpha blend relative to a naive
    /// per-record draw.
    pub fn has_transparency(&self) -> bool {
        self.records.iter().any(|r| r.opacity < 1.0)
            || self.key.blend_mode != crate::material::BlendMode::Opaque
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::BlendMode;

    fn record(z: i32, opacity: f32) -> GeometryRecord {
        GeometryRecord {
            vertices: vec![0.0; 6],
            indices: vec![0, 1, 2],
            material: MaterialKey::new(0, 0, BlendMode::Alpha, z),
            world_bounds: Rect::new(0.0, 0.0, 1.0, 1.0),
            vertex_layout: LayoutId::PositionColor,
            z_index: z,
            opacity,
        }
    }

    #[test]
    fn batch_bounds_accumulate_via_union() {
        let mut batch = Batch::new(MaterialKey::new(0, 0, BlendMode::Opaque, 0));
        batch.push(GeometryRecord { world_bounds: Rect::new(0.0, 0.0, 5.0, 5.0), ..record(0, 1.0) });
        batch.push(GeometryRecord { world_bounds: Rect::new(10.0, 10.0, 5.0, 5.0), ..record(0, 1.0) });
        assert_eq!(batch.spatial_bounds, Rect::new(0.0, 0.0, 15.0, 15.0));
    }

    #[test]
    fn transparency_detected_from_opacity_or_blend_mode() {
        let mut opaque = Batch::new(MaterialKey::new(0, 0, BlendMode::Opaque, 0));
        opaque.push(record(0, 1.0));
        assert!(!opaque.has_transparency());

        let mut translucent = Batch::new(MaterialKey::new(0, 0, BlendMode::Opaque, 0));
        translucent.push(record(0, 0.5));
        assert!(translucent.has_transparency());
    }
}
