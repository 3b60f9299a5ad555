/*!
 * Pooled GPU buffer bookkeeping.
 *
 * Buffers are handed out as opaque handles; a backend resolves a handle to
 * its real device resource when it services a flush. Pooling here is pure
 * CPU bookkeeping over byte buffers, mirroring the handle/pool split in the
 * engine's own buffer manager, scaled down to what a single-threaded 2D
 * pipeline needs.
 */

use std::collections::{HashMap, VecDeque};

use crate::error::{RenderError, RenderResult};

const POOL_ALIGNMENT: usize = 256;
const POOL_CAP_PER_BUCKET: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Static,
    Dynamic,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u32);

struct BufferEntry {
    kind: BufferKind,
    usage: BufferUsage,
    label: String,
    data: Vec<u8>,
    bound_target: Option<BufferKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PoolKey {
    size: usize,
    usage: BufferUsage,
}

/// Owns every GPU buffer the pipeline has allocated this session. Not
/// `Send`/`Sync`: all access happens from the single render thread.
pub struct BufferManager {
    next_handle: u32,
    active: HashMap<BufferHandle, BufferEntry>,
    free_pool: HashMap<PoolKey, VecDeque<BufferHandle>>,
}

impl BufferManager {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            active: HashMap::new(),
            free_pool: HashMap::new(),
        }
    }

    /// Allocates a new buffer, initially unbound and zero-sized.
    pub fn create(&mut self, kind: BufferKind, usage: BufferUsage, label: &str) -> BufferHandle {
        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        self.active.insert(
            handle,
            BufferEntry { kind, usage, label: label.to_string(), data: Vec::new(), bound_target: None },
        );
        handle
    }

    pub fn write(&mut self, handle: BufferHandle, data: &[u8], offset: usize) -> RenderResult<()> {
        let entry = self
            .active
            .get_mut(&handle)
            .ok_or_else(|| RenderError::BufferError(format!("unknown buffer handle {:?}", handle)))?;
        let end = offset + data.len();
        if entry.data.len() < end {
            entry.data.resize(end, 0);
        }
        entry.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    pub fn bind(&mut self, handle: BufferHandle, target: BufferKind) -> RenderResult<()> {
        let entry = self
            .active
            .get_mut(&handle)
            .ok_or_else(|| RenderError::BufferError(format!("unknown buffer handle {:?}", handle)))?;
        entry.bound_target = Some(target);
        Ok(())
    }

    pub fn data(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.active.get(&handle).map(|e| e.data.as_slice())
    }

    pub fn label(&self, handle: BufferHandle) -> Option<&str> {
        self.active.get(&handle).map(|e| e.label.as_str())
    }

    /// Pool acquisition for dynamic per-flush scratch buffers. `size` is
    /// rounded up to the 256-byte pool alignment.
    pub fn acquire_from_pool(&mut self, size: usize, usage: BufferUsage) -> BufferHandle {
        let aligned = align_up(size, POOL_ALIGNMENT);
        let key = PoolKey { size: aligned, usage };
        if let Some(queue) = self.free_pool.get_mut(&key) {
            if let Some(handle) = queue.pop_front() {
                return handle;
            }
        }
        let handle = self.create(BufferKind::Vertex, usage, "pooled-scratch");
        if let Some(entry) = self.active.get_mut(&handle) {
            entry.data.resize(aligned, 0);
        }
        handle
    }

    /// Returns a pooled buffer, unbinding it first. The bucket caps at
    /// `POOL_CAP_PER_BUCKET`; anything past that is freed instead of kept.
    pub fn release_to_pool(&mut self, handle: BufferHandle, size: usize, usage: BufferUsage) {
        if let Some(entry) = self.active.get_mut(&handle) {
            entry.bound_target = None;
        }
        let aligned = align_up(size, POOL_ALIGNMENT);
        let key = PoolKey { size: aligned, usage };
        let queue = self.free_pool.entry(key).or_default();
        if queue.len() < POOL_CAP_PER_BUCKET {
            queue.push_back(handle);
        } else {
            self.active.remove(&handle);
        }
    }

    pub fn dispose(&mut self) {
        self.active.clear();
        self.free_pool.clear();
    }

    /// Count of buffers the manager currently owns, pooled or not. Used to
    /// confirm a fixed per-frame allocation pattern doesn't leak.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

fn align_up(size: usize, alignment: usize) -> usize {
    ((size + alignment - 1) / alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut mgr = BufferManager::new();
        let handle = mgr.create(BufferKind::Vertex, BufferUsage::Dynamic, "test");
        mgr.write(handle, &[1, 2, 3, 4], 0).unwrap();
        assert_eq!(mgr.data(handle).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn write_to_unknown_handle_errors() {
        let mut mgr = BufferManager::new();
        let bogus = BufferHandle(999);
        assert!(mgr.write(bogus, &[1], 0).is_err());
    }

    #[test]
    fn pool_acquire_rounds_up_to_alignment() {
        let mut mgr = BufferManager::new();
        let handle = mgr.acquire_from_pool(10, BufferUsage::Stream);
        assert_eq!(mgr.data(handle).unwrap().len(), 256);
    }

    #[test]
    fn released_buffer_is_reused_by_acquire() {
        let mut mgr = BufferManager::new();
        let handle = mgr.acquire_from_pool(10, BufferUsage::Stream);
        mgr.release_to_pool(handle, 10, BufferUsage::Stream);
        let reused = mgr.acquire_from_pool(10, BufferUsage::Stream);
        assert_eq!(handle, reused);
    }

    #[test]
    fn pool_overflow_past_cap_is_freed_not_kept() {
        let mut mgr = BufferManager::new();
        let mut handles = Vec::new();
        for _ in 0..(POOL_CAP_PER_BUCKET + 2) {
            handles.push(mgr.acquire_from_pool(10, BufferUsage::Stream));
        }
        for &h in &handles {
            mgr.release_to_pool(h, 10, BufferUsage::Stream);
        }
        let key = PoolKey { size: align_up(10, POOL_ALIGNMENT), usage: BufferUsage::Stream };
        assert_eq!(mgr.free_pool[&key].len(), POOL_CAP_PER_BUCKET);
    }
}
