//! Per-caller render thread pools
//!
//! Each caller thread lazily builds its own rayon pool sized to its
//! thread configuration; pools are never shared across unrelated
//! callers, which bounds fan-out by caller count and avoids contention.
//! A closed pool makes subsequent renders run inline on the caller.

use std::cell::RefCell;
use std::sync::Arc;

/// Reader/compute thread budget for one render pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadConfig {
    /// Extra reader tasks beyond the calling thread
    pub reader_threads: usize,
    /// Worker threads for compute tasks
    pub compute_threads: usize,
}

impl ThreadConfig {
    /// No extra threads: a single reader computing inline
    pub fn single_threaded() -> Self {
        Self {
            reader_threads: 0,
            compute_threads: 0,
        }
    }

    /// Total pool size backing this configuration
    pub fn pool_size(&self) -> usize {
        self.reader_threads + self.compute_threads
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            reader_threads: 1,
            compute_threads: num_cpus::get(),
        }
    }
}

enum PoolSlot {
    Empty,
    Closed,
    Ready { size: usize, pool: Arc<rayon::ThreadPool> },
}

thread_local! {
    static RENDER_POOL: RefCell<PoolSlot> = const { RefCell::new(PoolSlot::Empty) };
}

/// Runs `f` with this thread's render pool of the requested size,
/// building or resizing it first. Passes `None` when the pool is closed,
/// the size is zero, or the pool cannot be built; the caller then runs
/// inline.
pub fn with_render_pool<R>(size: usize, f: impl FnOnce(Option<&rayon::ThreadPool>) -> R) -> R {
    let pool = RENDER_POOL.with(|slot| {
        let mut slot = slot.borrow_mut();
        match &*slot {
            PoolSlot::Closed => return None,
            PoolSlot::Ready { size: have, pool } if *have == size => {
                return Some(Arc::clone(pool));
            }
            _ => {}
        }

        if size == 0 {
            return None;
        }

        match rayon::ThreadPoolBuilder::new().num_threads(size).build() {
            Ok(pool) => {
                let pool = Arc::new(pool);
                *slot = PoolSlot::Ready {
                    size,
                    pool: Arc::clone(&pool),
                };
                Some(pool)
            }
            Err(e) => {
                log::warn!("render pool of {} threads not available: {}", size, e);
                None
            }
        }
    });

    f(pool.as_deref())
}

/// Closes the calling thread's render pool; later renders from this
/// thread run inline until the process restarts the thread
pub fn close_render_pool() {
    RENDER_POOL.with(|slot| {
        *slot.borrow_mut() = PoolSlot::Closed;
    });
}

/// Where a pipeline task runs: a rayon scope, or inline on the caller
pub enum SpawnCtx<'a, 'scope> {
    Pool(&'a rayon::Scope<'scope>),
    Inline,
}

impl<'a, 'scope> SpawnCtx<'a, 'scope> {
    /// Posts the task to the pool, or runs it immediately when inline
    pub fn spawn(&self, task: impl FnOnce() + Send + 'scope) {
        match self {
            SpawnCtx::Pool(scope) => scope.spawn(move |_| task()),
            SpawnCtx::Inline => task(),
        }
    }
}
