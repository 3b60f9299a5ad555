use std::collections::HashMap;

use crate::config::BatchStrategy;
use crate::material::MaterialKey;

use super::instancing::{extract_instances, INSTANCING_THRESHOLD};
use super::optimize::merge_adjacent;
use super::{Batch, GeometryRecord};

/// Vertex cap per batch, kept below the `u16` index space (65536) so a
/// batch's index buffer never needs 32-bit indices.
pub const DEFAULT_MAX_BATCH_VERTICES: usize = 10_000;
const MAX_INDICES: usize = 65_536;

/// Accepts `GeometryRecord`s emitted by the context during a frame, groups
/// them by `MaterialKey`, and produces an ordered, flush-ready sequence of
/// `Batch`es.
///
/// Mirrors the accumulate-then-flush shape of the engine's instancing
/// system: records are pushed incrementally during the frame, and
/// optimization/ordering happens once, at `flush`.
pub struct Batcher {
    max_batch_vertices: usize,
    strategy: BatchStrategy,
    open: HashMap<MaterialKey, usize>,
    batches: Vec<Batch>,
    dropped_records: u32,
}

impl Batcher {
    pub fn new(strategy: BatchStrategy) -> Self {
        Self {
            max_batch_vertices: DEFAULT_MAX_BATCH_VERTICES,
            strategy,
            open: HashMap::new(),
            batches: Vec::new(),
            dropped_records: 0,
        }
    }

    pub fn with_max_batch_vertices(mut self, max: usize) -> Self {
        self.max_batch_vertices = max.min(MAX_INDICES);
        self
    }

    pub fn set_strategy(&mut self, strategy: BatchStrategy) {
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> BatchStrategy {
        self.strategy
    }

    pub fn dropped_records(&self) -> u32 {
        self.dropped_records
    }

    /// Reads and resets the dropped-record counter, for a caller that
    /// reports it per frame rather than cumulatively.
    pub fn take_dropped_records(&mut self) -> u32 {
        std::mem::take(&mut self.dropped_records)
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty() && self.open.is_empty()
    }

    /// Adds a geometry record to the batcher, opening a new batch for its
    /// material if none exists yet, and splitting in place if it would
    /// push the open batch over its vertex or index cap.
    pub fn push(&mut self, record: GeometryRecord) {
        if record.indices.is_empty() || record.vertices.is_empty() {
            self.dropped_records += 1;
            return;
        }

        let key = record.material;
        let record_vertices = record.vertex_count();
        let record_indices = record.indices.len();

        let needs_new_batch = match self.open.get(&key) {
            Some(&idx) => {
                let batch = &self.batches[idx];
                batch.vertex_count() + record_vertices > self.max_batch_vertices
                    || batch.index_count() + record_indices > MAX_INDICES
            }
            None => true,
        };

        if needs_new_batch {
            let mut new_batch = Batch::new(key);
            // A batch created to take the overflow of a full predecessor
            // is marked non-mergeable so optimization never stitches the
            // split back together.
            new_batch.can_merge = !self.open.contains_key(&key);
            let idx = self.batches.len();
            self.batches.push(new_batch);
            self.open.insert(key, idx);
        }

        let idx = self.open[&key];
        self.batches[idx].push(record);
    }

    /// Runs optimization (if the strategy calls for it) and returns
    /// flush-ordered batches, leaving the batcher empty and ready for the
    /// next frame.
    pub fn flush(&mut self) -> Vec<Batch> {
        self.open.clear();
        let mut batches = std::mem::take(&mut self.batches);

        if matches!(self.strategy, BatchStrategy::Enhanced | BatchStrategy::Instanced | BatchStrategy::Auto) {
            batches = merge_adjacent(batches);
        }

        if matches!(self.strategy, BatchStrategy::Instanced | BatchStrategy::Auto) {
            for batch in &mut batches {
                if batch.records.len() >= INSTANCING_THRESHOLD {
                    if let Some(instances) = extract_instances(batch) {
                        batch.instanced = true;
                        batch.instances = Some(instances);
                    }
                }
            }
        }

        order_for_flush(&mut batches);
        batches
    }
}

/// Sorts batches into the guaranteed flush order: opaque before
/// transparent, then ascending z-band, shader id, texture id, and finally
/// insertion order (a stable sort preserves the last tiebreak for free).
fn order_for_flush(batches: &mut [Batch]) {
    batches.sort_by_key(|b| {
        (
            b.has_transparency(),
            b.key.z_band,
            b.key.shader_id,
            b.key.texture_id,
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::LayoutId;
    use crate::material::BlendMode;
    use crate::math::Rect;

    fn record(material: MaterialKey, opacity: f32) -> GeometryRecord {
        GeometryRecord {
            vertices: vec![0.0; 6],
            indices: vec![0, 1, 2],
            material,
            world_bounds: Rect::new(0.0, 0.0, 1.0, 1.0),
            vertex_layout: LayoutId::PositionColor,
            z_index: material.z_band * 10,
            opacity,
        }
    }

    #[test]
    fn records_with_same_material_share_a_batch() {
        let mut batcher = Batcher::new(BatchStrategy::Basic);
        let key = MaterialKey::new(1, 1, BlendMode::Opaque, 0);
        batcher.push(record(key, 1.0));
        batcher.push(record(key, 1.0));
        let batches = batcher.flush();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].records.len(), 2);
    }

    #[test]
    fn distinct_materials_produce_distinct_batches() {
        let mut batcher = Batcher::new(BatchStrategy::Basic);
        batcher.push(record(MaterialKey::new(1, 1, BlendMode::Opaque, 0), 1.0));
        batcher.push(record(MaterialKey::new(2, 1, BlendMode::Opaque, 0), 1.0));
        assert_eq!(batcher.flush().len(), 2);
    }

    #[test]
    fn overflowing_batch_splits_and_marks_non_mergeable() {
        let mut batcher = Batcher::new(BatchStrategy::Basic).with_max_batch_vertices(1);
        let key = MaterialKey::new(1, 1, BlendMode::Opaque, 0);
        batcher.push(record(key, 1.0));
        batcher.push(record(key, 1.0));
        let batches = batcher.flush();
        assert_eq!(batches.len(), 2);
        assert!(!batches[0].can_merge || !batches[1].can_merge);
    }

    #[test]
    fn take_dropped_records_resets_the_counter() {
        let mut batcher = Batcher::new(BatchStrategy::Basic);
        let mut empty = record(MaterialKey::new(1, 1, BlendMode::Opaque, 0), 1.0);
        empty.indices.clear();
        batcher.push(empty);
        assert_eq!(batcher.take_dropped_records(), 1);
        assert_eq!(batcher.dropped_records(), 0);
    }

    #[test]
    fn empty_record_is_dropped_not_panicked() {
        let mut batcher = Batcher::new(BatchStrategy::Basic);
        let mut empty = record(MaterialKey::new(1, 1, BlendMode::Opaque, 0), 1.0);
        empty.indices.clear();
        batcher.push(empty);
        assert_eq!(batcher.dropped_records(), 1);
        assert!(batcher.flush().is_empty());
    }

    #[test]
    fn flush_orders_opaque_before_transparent() {
        let mut batcher = Batcher::new(BatchStrategy::Basic);
        batcher.push(record(MaterialKey::new(1, 1, BlendMode::Alpha, 0), 0.5));
        batcher.push(record(MaterialKey::new(2, 1, BlendMode::Opaque, 0), 1.0));
        let batches = batcher.flush();
        assert!(!batches[0].has_transparency());
        assert!(batches[1].has_transparency());
    }

    #[test]
    fn flush_orders_ascending_z_band() {
        let mut batcher = Batcher::new(BatchStrategy::Basic);
        batcher.push(record(MaterialKey::new(1, 1, BlendMode::Opaque, 20), 1.0));
        batcher.push(record(MaterialKey::new(1, 1, BlendMode::Opaque, 0), 1.0));
        let batches = batcher.flush();
        assert_eq!(batches[0].key.z_band, 0);
        assert_eq!(batches[1].key.z_band, 2);
    }

    #[test]
    fn flush_is_idempotent_on_empty_batcher() {
        let mut batcher = Batcher::new(BatchStrategy::Basic);
        assert!(batcher.flush().is_empty());
    }

    #[test]
    fn enhanced_strategy_merges_adjacent_opaque_bands() {
        let mut batcher = Batcher::new(BatchStrategy::Enhanced);
        batcher.push(record(MaterialKey::new(1, 1, BlendMode::Opaque, 0), 1.0));
        batcher.push(record(MaterialKey::new(1, 1, BlendMode::Opaque, 10), 1.0));
        assert_eq!(batcher.flush().len(), 1);
    }
}
