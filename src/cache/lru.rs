//! Dual-budget LRU over completed render futures
//!
//! The LRU is the owning reference for rendered bitmaps: evicting an
//! entry drops the last strong reference, which lets the weak per-zoom
//! slot on the tile lapse and a fresh future be derived next time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::cache::future::LoadFuture;

/// LRU with independent count and byte budgets.
///
/// The `min_count` floor keeps a few renders cached even when a single
/// high-quality bitmap exceeds the byte budget on its own. All mutation
/// serialises on the entry list lock; the byte counter is atomic only so
/// `size_bytes` reads do not block.
pub struct ShadeLru {
    min_count: usize,
    max_count: usize,
    max_bytes: u64,
    entries: Mutex<VecDeque<(Arc<LoadFuture>, u64)>>,
    bytes: AtomicU64,
}

impl ShadeLru {
    pub fn new(min_count: usize, max_count: usize, max_bytes: u64) -> Self {
        Self {
            min_count,
            max_count: max_count.max(1),
            max_bytes,
            entries: Mutex::new(VecDeque::new()),
            bytes: AtomicU64::new(0),
        }
    }

    /// Byte budget shared with the admission limiter
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Records a use of a completed future, making it most recent, then
    /// evicts from the LRU end until both budgets hold.
    ///
    /// Must be called after the future has completed so its byte size is
    /// populated.
    pub fn mark_used(&self, fut: &Arc<LoadFuture>) {
        let mut entries = self.entries.lock().unwrap();

        if let Some(pos) = entries.iter().position(|(e, _)| Arc::ptr_eq(e, fut)) {
            let (_, old_size) = entries.remove(pos).unwrap();
            self.bytes.fetch_sub(old_size, Ordering::SeqCst);
        }

        let size = fut.size_bytes();
        entries.push_back((Arc::clone(fut), size));
        self.bytes.fetch_add(size, Ordering::SeqCst);

        while entries.len() > self.max_count
            || (entries.len() > self.min_count
                && self.bytes.load(Ordering::SeqCst) > self.max_bytes)
        {
            let (_, evicted) = entries.pop_front().unwrap();
            self.bytes.fetch_sub(evicted, Ordering::SeqCst);
        }
    }

    /// Evicts least-recent entries until `want` more bytes fit under the
    /// byte budget. Called before awaiting a pending future, so eviction
    /// happens before the new bitmap materialises.
    pub fn ensure_enough_space(&self, want: u64) {
        let mut entries = self.entries.lock().unwrap();
        while !entries.is_empty() && want + self.bytes.load(Ordering::SeqCst) > self.max_bytes {
            let (_, evicted) = entries.pop_front().unwrap();
            self.bytes.fetch_sub(evicted, Ordering::SeqCst);
        }
    }

    /// Current cached byte total (lock-free)
    pub fn size_bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    /// Current entry count
    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::ShadeBitmap;

    fn done_future(bytes: usize) -> Arc<LoadFuture> {
        // padding 0, axis chosen so the bitmap footprint is exact
        let axis = (bytes as f64).sqrt() as usize;
        assert_eq!(axis * axis, bytes);
        let fut = Arc::new(LoadFuture::new(0, move || {
            Ok(Some(Arc::new(
                ShadeBitmap::new(axis, 0, vec![0; axis * axis]).unwrap(),
            )))
        }));
        fut.wait();
        fut
    }

    #[test]
    fn test_mark_used_accumulates() {
        let lru = ShadeLru::new(0, 10, 1_000_000);
        let a = done_future(10_000);
        let b = done_future(40_000);

        lru.mark_used(&a);
        lru.mark_used(&b);
        assert_eq!(lru.count(), 2);
        assert_eq!(lru.size_bytes(), 50_000);

        // Re-marking moves, not duplicates.
        lru.mark_used(&a);
        assert_eq!(lru.count(), 2);
        assert_eq!(lru.size_bytes(), 50_000);
    }

    #[test]
    fn test_dual_budget_eviction() {
        // min 2, max 3, 10 MB; four 4 MB renders in order A, B, C, D.
        let lru = ShadeLru::new(2, 3, 10_000_000);
        let futures: Vec<_> = (0..4).map(|_| done_future(4_000_000)).collect();

        for fut in &futures {
            lru.mark_used(fut);
        }

        assert_eq!(lru.count(), 2);
        assert_eq!(lru.size_bytes(), 8_000_000);

        // The survivors are C and D: marking them changes nothing.
        lru.mark_used(&futures[2]);
        lru.mark_used(&futures[3]);
        assert_eq!(lru.count(), 2);
        assert_eq!(lru.size_bytes(), 8_000_000);
    }

    #[test]
    fn test_min_count_floor_overrides_bytes() {
        let lru = ShadeLru::new(2, 10, 1_000_000);
        let a = done_future(4_000_000);
        let b = done_future(4_000_000);

        lru.mark_used(&a);
        lru.mark_used(&b);

        // Over budget by bytes, but never evicted below the floor.
        assert_eq!(lru.count(), 2);
        assert_eq!(lru.size_bytes(), 8_000_000);
    }

    #[test]
    fn test_ensure_enough_space_evicts_from_lru_end() {
        let lru = ShadeLru::new(0, 10, 100_000);
        let a = done_future(40_000);
        let b = done_future(40_000);
        lru.mark_used(&a);
        lru.mark_used(&b);

        lru.ensure_enough_space(50_000);
        assert_eq!(lru.count(), 1);
        assert_eq!(lru.size_bytes(), 40_000);

        // The survivor is B, the most recent.
        lru.mark_used(&b);
        assert_eq!(lru.count(), 1);
    }

    #[test]
    fn test_ensure_enough_space_stops_when_empty() {
        let lru = ShadeLru::new(0, 10, 100);
        lru.ensure_enough_space(1_000_000);
        assert_eq!(lru.count(), 0);
    }

    #[test]
    fn test_budgets_hold_quiescently() {
        let lru = ShadeLru::new(1, 3, 30_000);
        for _ in 0..10 {
            lru.mark_used(&done_future(10_000));
            assert!(lru.count() <= 3);
            assert!(lru.count() <= 1 || lru.size_bytes() <= 30_000);
        }
    }
}
