/*!
 * Thin ordered view over a flushed batch sequence.
 *
 * Exists as its own type so a coordinator sitting above the engine (e.g. a
 * post-processing pass that needs an intermediate target between two
 * z-bands) can be handed the flush-ordered batches without reaching into
 * the `Batcher` itself. The batcher is the only producer; `RenderQueue`
 * carries no state beyond the batches it was built from.
 */

use crate::batch::Batch;

/// An immutable, already-ordered sequence of batches ready to flush.
pub struct RenderQueue {
    batches: Vec<Batch>,
}

impl RenderQueue {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.iter()
    }

    pub fn as_slice(&self) -> &[Batch] {
        &self.batches
    }

    pub fn into_inner(self) -> Vec<Batch> {
        self.batches
    }
}

impl<'a> IntoIterator for &'a RenderQueue {
    type Item = &'a Batch;
    type IntoIter = std::slice::Iter<'a, Batch>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{BlendMode, MaterialKey};

    #[test]
    fn wraps_batches_without_reordering() {
        let batches = vec![
            Batch::new(MaterialKey::new(0, 0, BlendMode::Opaque, 0)),
            Batch::new(MaterialKey::new(1, 0, BlendMode::Opaque, 0)),
        ];
        let queue = RenderQueue::new(batches);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.iter().count(), 2);
    }

    #[test]
    fn empty_queue_reports_empty() {
        let queue = RenderQueue::new(Vec::new());
        assert!(queue.is_empty());
    }
}
