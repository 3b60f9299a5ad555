/*!
 * Named, z-ordered containers of renderables.
 */

use std::collections::HashMap;

use crate::error::{RenderError, RenderResult};
use crate::renderable::Renderable;

/// An ordered bucket of renderables drawn as a unit, at a fixed z relative
/// to other layers.
///
/// Add/remove/clear are O(1) amortized; lookup by renderable id is O(1).
/// Internally this is a `Vec` for stable insertion-order iteration plus an
/// id → index map for lookup, the same two-structure trick the batcher
/// uses for its own record bookkeeping.
pub struct Layer {
    name: String,
    z: i32,
    renderables: Vec<Box<dyn Renderable>>,
    index_of: HashMap<String, usize>,
}

impl Layer {
    pub fn new(name: impl Into<String>, z: i32) -> Self {
        Self {
            name: name.into(),
            z,
            renderables: Vec::new(),
            index_of: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn len(&self) -> usize {
        self.renderables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderables.is_empty()
    }

    /// Appends a renderable. Fails with `DuplicateId` without inserting if
    /// a renderable with the same id already exists in this layer.
    pub fn add(&mut self, renderable: Box<dyn Renderable>) -> RenderResult<()> {
        let id = renderable.id().to_string();
        if self.index_of.contains_key(&id) {
            return Err(RenderError::DuplicateId(id));
        }
        self.index_of.insert(id, self.renderables.len());
        self.renderables.push(renderable);
        Ok(())
    }

    /// Removes a renderable by id using swap-remove, calling `dispose` on
    /// it. O(1) amortized; does not preserve the order of the element that
    /// used to occupy the last slot, but `iter_sorted` re-sorts by z_index
    /// before draw anyway so insertion order within a layer is only a
    /// tie-break, not a stored invariant.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(&index) = self.index_of.get(id) else {
            return false;
        };
        let mut removed = self.renderables.swap_remove(index);
        removed.dispose();
        self.index_of.remove(id);
        if index < self.renderables.len() {
            let moved_id = self.renderables[index].id().to_string();
            self.index_of.insert(moved_id, index);
        }
        true
    }

    pub fn get(&self, id: &str) -> Option<&dyn Renderable> {
        self.index_of.get(id).map(|&i| self.renderables[i].as_ref())
    }

    pub fn clear(&mut self) {
        for mut r in self.renderables.drain(..) {
            r.dispose();
        }
        self.index_of.clear();
    }

    /// Visible renderables in draw order: ascending `z_index`, ties broken
    /// by insertion order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &dyn Renderable> {
        let mut visible: Vec<&dyn Renderable> = self
            .renderables
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| r.visible())
            .collect();
        visible.sort_by_key(|r| r.z_index());
        visible.into_iter()
    }
}
