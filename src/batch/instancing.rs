//! Per-instance data extraction for the `INSTANCED` strategy.

use super::Batch;

pub const INSTANCING_THRESHOLD: usize = 50;

/// One instance's contribution to an instanced draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceData {
    /// `(x, y, scale_x, scale_y)` relative to the batch's template record.
    pub transform: [f32; 4],
    pub tint: [f32; 4],
    pub uv_offset: [f32; 4],
}

/// Extracts per-instance data if `batch` is instancing-eligible: at least
/// `INSTANCING_THRESHOLD` records, all sharing the same vertex layout and
/// index topology (same triangle count per record), differing only in
/// position/scale/tint. Returns `None` otherwise, leaving the batch to
/// flush as ordinary (non-instanced) geometry.
pub fn extract_instances(batch: &Batch) -> Option<Vec<InstanceData>> {
    if batch.records.len() < INSTANCING_THRESHOLD {
        return None;
    }
    let template = batch.records.first()?;
    let same_topology = batch
        .records
        .iter()
        .all(|r| r.vertex_layout == template.vertex_layout && r.indices.len() == template.indices.len());
    if !same_topology {
        return None;
    }

    let template_size = (template.world_bounds.width.max(1e-6), template.world_bounds.height.max(1e-6));

    Some(
        batch
            .records
            .iter()
            .map(|record| {
                let (cx, cy) = record.world_bounds.center();
                let scale_x = record.world_bounds.width / template_size.0;
                let scale_y = record.world_bounds.height / template_size.1;
                InstanceData {
                    transform: [cx, cy, scale_x, scale_y],
                    tint: average_color(record),
                    uv_offset: [0.0, 0.0, 1.0, 1.0],
                }
            })
            .collect(),
    )
}

/// Averages the RGBA channels packed into a record's interleaved vertex
/// buffer, using the record's layout to find the color offset.
fn average_color(record: &super::GeometryRecord) -> [f32; 4] {
    let stride = record.vertex_layout.floats_per_vertex();
    let color_offset = match record.vertex_layout {
        super::LayoutId::PositionColor => 2,
        super::LayoutId::PositionUvColor => 4,
    };
    let mut sum = [0.0f32; 4];
    let mut count = 0;
    let mut i = color_offset;
    while i + 3 < record.vertices.len() {
        for c in 0..4 {
            sum[c] += record.vertices[i + c];
        }
        count += 1;
        i += stride;
    }
    if count == 0 {
        return [1.0, 1.0, 1.0, record.opacity];
    }
    sum.map(|v| v / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{GeometryRecord, LayoutId};
    use crate::material::{BlendMode, MaterialKey};
    use crate::math::Rect;

    fn record_at(x: f32, y: f32) -> GeometryRecord {
        GeometryRecord {
            vertices: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
            material: MaterialKey::new(0, 0, BlendMode::Opaque, 0),
            world_bounds: Rect::new(x, y, 10.0, 10.0),
            vertex_layout: LayoutId::PositionColor,
            z_index: 0,
            opacity: 1.0,
        }
    }

    #[test]
    fn below_threshold_is_not_instanced() {
        let mut batch = Batch::new(MaterialKey::new(0, 0, BlendMode::Opaque, 0));
        for i in 0..10 {
            batch.push(record_at(i as f32, 0.0));
        }
        assert!(extract_instances(&batch).is_none());
    }

    #[test]
    fn at_threshold_with_matching_topology_is_instanced() {
        let mut batch = Batch::new(MaterialKey::new(0, 0, BlendMode::Opaque, 0));
        for i in 0..INSTANCING_THRESHOLD {
            batch.push(record_at(i as f32, 0.0));
        }
        let instances = extract_instances(&batch).unwrap();
        assert_eq!(instances.len(), INSTANCING_THRESHOLD);
        assert_eq!(instances[5].transform[0], 5.0 + 5.0);
    }

    #[test]
    fn mismatched_topology_is_not_instanced() {
        let mut batch = Batch::new(MaterialKey::new(0, 0, BlendMode::Opaque, 0));
        for i in 0..INSTANCING_THRESHOLD {
            batch.push(record_at(i as f32, 0.0));
        }
        let mut odd_one_out = record_at(0.0, 0.0);
        odd_one_out.indices = vec![0, 1, 2, 0, 2, 3];
        batch.records[0] = odd_one_out;
        assert!(extract_instances(&batch).is_none());
    }
}
