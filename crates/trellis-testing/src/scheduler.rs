//! Manual scheduler: records wake-up requests instead of scheduling
//! anything, so a test drives `flush_microtasks`/`flush_macrotasks` by
//! hand and can assert that enqueues actually asked for a flush.

use std::sync::atomic::{AtomicUsize, Ordering};

use trellis_core::platform::RuntimeScheduler;

#[derive(Default)]
pub struct ManualScheduler {
    wakeups: AtomicUsize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wakeups(&self) -> usize {
        self.wakeups.load(Ordering::Relaxed)
    }
}

impl RuntimeScheduler for ManualScheduler {
    fn schedule_flush(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }
}
