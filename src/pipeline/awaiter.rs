//! Cooperative wait/notify and the active-task admission counter

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Upper bound on one wait slice; bounded waits tolerate lost
/// notifications
const WAIT_SLICE: Duration = Duration::from_millis(200);

/// Predicate-driven wait/notify over a single monitor
pub struct Awaiter {
    lock: Mutex<()>,
    cond: Condvar,
}

impl Awaiter {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    /// Blocks until `pred()` is true, waking on notifications or the
    /// wait-slice timeout
    pub fn do_wait(&self, pred: impl Fn() -> bool) {
        let mut guard = self.lock.lock().unwrap();
        while !pred() {
            let (next, _timeout) = self.cond.wait_timeout(guard, WAIT_SLICE).unwrap();
            guard = next;
        }
    }

    /// Wakes one waiter
    pub fn do_notify(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cond.notify_one();
    }
}

impl Default for Awaiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts tasks that are queued or running, and paces readers when the
/// count reaches the admission cap.
///
/// A task is active from the reader's `pace()` until the compute task's
/// `release()`; the count therefore bounds the sample buffers committed
/// at any instant.
pub struct ActiveTasks {
    active: AtomicUsize,
    max: usize,
    awaiter: Awaiter,
}

impl ActiveTasks {
    pub fn new(max: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            max: max.max(1),
            awaiter: Awaiter::new(),
        }
    }

    /// Takes one active-task slot, waiting while the cap is reached
    pub fn pace(&self) {
        if self.try_acquire() {
            return;
        }
        loop {
            self.awaiter
                .do_wait(|| self.active.load(Ordering::SeqCst) < self.max);
            if self.try_acquire() {
                log::trace!("reading paced, {} tasks active", self.active());
                return;
            }
        }
    }

    fn try_acquire(&self) -> bool {
        let mut current = self.active.load(Ordering::SeqCst);
        while current < self.max {
            match self.active.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(seen) => current = seen,
            }
        }
        false
    }

    /// Returns a slot and wakes one paced reader
    pub fn release(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.awaiter.do_notify();
    }

    /// Currently active tasks
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}
