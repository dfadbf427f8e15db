//! Admission cap on aggregate in-flight output bytes

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Timed waits tolerate lost notifications
const WAIT_SLICE: Duration = Duration::from_millis(200);

/// A blocking sum limiter shared by all concurrent tile requests.
///
/// `add` blocks while admitting `amount` would push the ledger over the
/// cap, except that a single request larger than the whole cap is
/// admitted once the ledger is empty, so an oversized tile cannot
/// deadlock itself.
pub struct SumLimiter {
    sum: Mutex<u64>,
    drained: Condvar,
}

impl SumLimiter {
    pub fn new() -> Self {
        Self {
            sum: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Blocks until `amount` fits under `max`, then adds it
    pub fn add(&self, amount: u64, max: u64) {
        let mut sum = self.sum.lock().unwrap();
        while *sum > 0 && *sum + amount > max {
            let (guard, _timeout) = self.drained.wait_timeout(sum, WAIT_SLICE).unwrap();
            sum = guard;
        }
        *sum += amount;
    }

    /// Removes `amount` from the ledger and wakes blocked admissions
    pub fn subtract(&self, amount: u64) {
        let mut sum = self.sum.lock().unwrap();
        *sum = sum.saturating_sub(amount);
        self.drained.notify_all();
    }

    /// Current ledger value
    pub fn current(&self) -> u64 {
        *self.sum.lock().unwrap()
    }
}

impl Default for SumLimiter {
    fn default() -> Self {
        Self::new()
    }
}
