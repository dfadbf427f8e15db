//! One-shot memoised computations shared between threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::bitmap::ShadeBitmap;
use crate::error::Result;

enum LazyState<T> {
    Pending(Option<Box<dyn FnOnce() -> T + Send>>),
    Done(T),
}

/// A thread-safe, awaitable, one-shot memoised computation.
///
/// The first caller of [`Lazy::get`] runs the calculation under the
/// state lock; concurrent callers block on the same lock and receive the
/// memoised value once it is released. The calculation runs exactly once.
pub struct Lazy<T> {
    done: AtomicBool,
    state: Mutex<LazyState<T>>,
}

impl<T: Clone + Send + 'static> Lazy<T> {
    pub fn new(calc: impl FnOnce() -> T + Send + 'static) -> Self {
        Self {
            done: AtomicBool::new(false),
            state: Mutex::new(LazyState::Pending(Some(Box::new(calc)))),
        }
    }

    /// Returns the memoised value, computing it on the first call
    pub fn get(&self) -> T {
        let mut state = self.state.lock().unwrap();

        if let LazyState::Pending(slot) = &mut *state {
            let calc = slot.take().expect("lazy calculation ran twice");
            let value = calc();
            *state = LazyState::Done(value);
            self.done.store(true, Ordering::SeqCst);
        }

        match &*state {
            LazyState::Done(value) => value.clone(),
            LazyState::Pending(_) => unreachable!("lazy state settled above"),
        }
    }

    /// Returns the value if the computation has already finished.
    /// Never runs the calculation.
    pub fn try_get(&self) -> Option<T> {
        if !self.is_done() {
            return None;
        }
        match &*self.state.lock().unwrap() {
            LazyState::Done(value) => Some(value.clone()),
            LazyState::Pending(_) => None,
        }
    }

    /// Whether the computation has completed, without blocking
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Spawns a worker that drives the computation and discards the
    /// result
    pub fn start_on_background(self: &Arc<Self>) {
        let lazy = Arc::clone(self);
        thread::spawn(move || {
            let _ = lazy.get();
        });
    }
}

/// The memoised rendering of one `(tile, zoom)` under one cache tag.
///
/// All concurrent requesters of a matching tag share one future, so the
/// tile is rendered at most once. A failed render is reported and
/// memoised as absent.
pub struct LoadFuture {
    tag: i64,
    inner: Lazy<Option<Arc<ShadeBitmap>>>,
}

impl LoadFuture {
    pub fn new(
        tag: i64,
        calc: impl FnOnce() -> Result<Option<Arc<ShadeBitmap>>> + Send + 'static,
    ) -> Self {
        Self {
            tag,
            inner: Lazy::new(move || match calc() {
                Ok(bitmap) => bitmap,
                Err(e) => {
                    log::warn!("shade rendering failed: {}", e);
                    None
                }
            }),
        }
    }

    /// The cache tag this future was derived for
    pub fn tag(&self) -> i64 {
        self.tag
    }

    /// Blocks until the bitmap is available; the first caller computes it
    pub fn wait(&self) -> Option<Arc<ShadeBitmap>> {
        self.inner.get()
    }

    /// Whether the render has completed, without blocking
    pub fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    /// In-memory footprint of the rendered bitmap; 0 while pending or
    /// when the render produced nothing
    pub fn size_bytes(&self) -> u64 {
        self.inner
            .try_get()
            .flatten()
            .map(|bitmap| bitmap.size_bytes())
            .unwrap_or(0)
    }

    /// Drives the render on a background worker, discarding the result
    pub fn start_on_background(self: &Arc<Self>) {
        let fut = Arc::clone(self);
        thread::spawn(move || {
            let _ = fut.wait();
        });
    }
}
