//! Lock-free pooling of short-integer sample buffers

use std::sync::Arc;

use crossbeam::queue::SegQueue;
use dashmap::DashMap;

/// Lock-free pool of `Vec<i16>` sample buffers, shelved by length.
///
/// `get(n)` pops a recycled buffer of exactly `n` samples or allocates a
/// fresh zeroed one; `recycle` shelves a buffer for reuse. The pool is
/// unbounded: it never refuses a recycle.
pub struct BufferPool {
    shelves: Arc<DashMap<usize, SegQueue<Vec<i16>>>>,
}

impl BufferPool {
    /// Creates an empty pool
    pub fn new() -> Self {
        Self {
            shelves: Arc::new(DashMap::new()),
        }
    }

    /// Returns a buffer of length `len`, recycled if one is shelved
    pub fn get(&self, len: usize) -> Vec<i16> {
        if let Some(shelf) = self.shelves.get(&len) {
            if let Some(buf) = shelf.pop() {
                return buf;
            }
        }

        vec![0i16; len]
    }

    /// Returns a buffer to the pool
    pub fn recycle(&self, buf: Vec<i16>) {
        if buf.is_empty() {
            return;
        }
        self.shelves.entry(buf.len()).or_default().push(buf);
    }

    /// Returns the number of shelved buffers across all lengths
    pub fn shelved(&self) -> usize {
        self.shelves.iter().map(|shelf| shelf.len()).sum()
    }
}

impl Clone for BufferPool {
    fn clone(&self) -> Self {
        Self {
            shelves: Arc::clone(&self.shelves),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// The two buffer pools a cache carries: bulk block arrays read ahead by
/// reader tasks, and single-row line buffers.
#[derive(Clone, Default)]
pub struct RasterPools {
    pub blocks: BufferPool,
    pub lines: BufferPool,
}

impl RasterPools {
    pub fn new() -> Self {
        Self::default()
    }
}
