//! Merge and spatial-cluster passes used by the `ENHANCED`/`INSTANCED`
//! strategies between accumulation and flush.

use super::Batch;

const SPATIAL_THRESHOLD: f32 = 100.0;

/// Merges adjacent batches whose texture/shader/blend match and whose
/// z-bands differ by at most 1, preserving per-record order by
/// concatenation. A batch marked `can_merge = false` (the overflow half of
/// a split) is never merged, in either direction.
///
/// Cross-band merges are refused whenever either side carries any
/// transparent record, so merging never changes the rendered result.
pub fn merge_adjacent(mut batches: Vec<Batch>) -> Vec<Batch> {
    let mut merged: Vec<Batch> = Vec::with_capacity(batches.len());
    batches.sort_by_key(|b| b.key.z_band);

    for batch in batches {
        let can_join = merged.iter_mut().rev().find(|existing: &&mut Batch| {
            existing.can_merge
                && batch.can_merge
                && existing.key.same_material_family(&batch.key)
                && (existing.key.z_band - batch.key.z_band).abs() <= 1
                && !existing.has_transparency()
                && !batch.has_transparency()
        });

        match can_join {
            Some(existing) => {
                existing.records.extend(batch.records);
                existing.spatial_bounds = existing.spatial_bounds.union(&batch.spatial_bounds);
            }
            None => merged.push(batch),
        }
    }
    merged
}

/// Groups same-material records into spatial clusters by center distance.
/// Clusters are informational only here (tagged via `estimated_cost`, used
/// by the flush order and by tests); the actual single-draw-call
/// consolidation happens when the caller flushes `spatial_bounds`-adjacent
/// batches back to back, which the priority ordering already guarantees
/// for batches sharing a `MaterialKey`.
pub fn spatial_cluster_cost(batch: &Batch) -> f32 {
    if batch.records.len() < 2 {
        return batch.records.len() as f32;
    }
    let mut clusters: Vec<(f32, f32)> = Vec::new();
    for record in &batch.records {
        let (cx, cy) = record.world_bounds.center();
        let joined = clusters.iter().any(|&(ccx, ccy)| {
            let dx = cx - ccx;
            let dy = cy - ccy;
            (dx * dx + dy * dy).sqrt() <= SPATIAL_THRESHOLD
        });
        if !joined {
            clusters.push((cx, cy));
        }
    }
    clusters.len() as f32
}
